//! Property filters for narrowing a review session.
//!
//! A chain is an ordered list of `property = value` tests joined by AND/OR connectors.
//! The first entry's connector is ignored. Properties are resolved by the caller
//! (see [`crate::notes::parse_properties`]).
//!
//! Two evaluation modes exist:
//! - [`ChainMode::Fold`] (default) folds left to right: `((f0 op1 f1) op2 f2) ...`.
//! - [`ChainMode::ShortCircuit`] stops with `false` as soon as an entry whose connector is
//!   AND (the first entry included) leaves the running result false, so a later OR can no
//!   longer re-admit the item. Kept for parity with older review sessions.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::item::ReviewItem;

/// A resolved document property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Text(String),
    Number(f64),
    Bool(bool),
    List(Vec<PropertyValue>),
    Null,
}

impl PropertyValue {
    /// String form used for scalar comparison; `None` for lists and null.
    pub fn as_scalar_text(&self) -> Option<String> {
        match self {
            PropertyValue::Text(s) => Some(s.clone()),
            PropertyValue::Number(n) => Some(n.to_string()),
            PropertyValue::Bool(b) => Some(b.to_string()),
            PropertyValue::List(_) | PropertyValue::Null => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_string())
    }
}

/// Property name → value for one document.
pub type Properties = BTreeMap<String, PropertyValue>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connector {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChainMode {
    #[default]
    Fold,
    ShortCircuit,
}

/// One entry of a filter chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub property: String,
    pub value: String,
    #[serde(default)]
    pub connector: Connector,
}

impl Filter {
    pub fn new(property: impl Into<String>, value: impl Into<String>, connector: Connector) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
            connector,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let connector = match self.connector {
            Connector::And => "and",
            Connector::Or => "or",
        };
        write!(f, "{}:{}={}", connector, self.property, self.value)
    }
}

/// Parses `property=value`, `and:property=value` or `or:property=value`.
impl FromStr for Filter {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let lower = s.to_ascii_lowercase();
        let (connector, rest) = if lower.starts_with("or:") {
            (Connector::Or, &s[3..])
        } else if lower.starts_with("and:") {
            (Connector::And, &s[4..])
        } else {
            (Connector::And, s)
        };
        let (property, value) = rest
            .split_once('=')
            .ok_or_else(|| FilterParseError::MissingEquals(s.to_string()))?;
        let property = property.trim();
        if property.is_empty() {
            return Err(FilterParseError::EmptyProperty(s.to_string()));
        }
        Ok(Filter::new(property, value.trim(), connector))
    }
}

/// Whether a single filter holds for `properties`.
///
/// Lists match when one of their text elements equals the value exactly; scalars compare
/// by their string form; missing and null properties never match.
pub fn matches(properties: &Properties, filter: &Filter) -> bool {
    match properties.get(&filter.property) {
        Some(PropertyValue::List(values)) => values
            .iter()
            .any(|v| matches!(v, PropertyValue::Text(s) if *s == filter.value)),
        Some(value) => value.as_scalar_text().is_some_and(|s| s == filter.value),
        None => false,
    }
}

/// Evaluates a chain in [`ChainMode::Fold`]. An empty chain matches everything.
pub fn evaluate(properties: &Properties, chain: &[Filter]) -> bool {
    evaluate_with(properties, chain, ChainMode::Fold)
}

pub fn evaluate_with(properties: &Properties, chain: &[Filter], mode: ChainMode) -> bool {
    let mut result = true;
    for (i, filter) in chain.iter().enumerate() {
        let hit = matches(properties, filter);
        result = if i == 0 {
            hit
        } else {
            match filter.connector {
                Connector::And => result && hit,
                Connector::Or => result || hit,
            }
        };
        if mode == ChainMode::ShortCircuit && filter.connector == Connector::And && !result {
            return false;
        }
    }
    result
}

/// Keeps the items whose resolved properties satisfy `chain`, preserving order.
pub fn retain_matching<F>(items: Vec<ReviewItem>, chain: &[Filter], mode: ChainMode, mut resolve: F) -> Vec<ReviewItem>
where
    F: FnMut(&ReviewItem) -> Properties,
{
    if chain.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| evaluate_with(&resolve(item), chain, mode))
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum FilterParseError {
    #[error("filter {0:?} must look like property=value")]
    MissingEquals(String),
    #[error("filter {0:?} has an empty property name")]
    EmptyProperty(String),
}
