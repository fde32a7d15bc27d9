//! The persisted review document (JSON, versioned).

use serde::{Deserialize, Serialize};

use crate::item::ReviewItem;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: u32,
    #[serde(default)]
    pub items: Vec<ReviewItem>,
    #[serde(default)]
    pub last_reset_date: String,
    #[serde(default)]
    pub new_cards_reviewed_today: u32,
}

/// Only the version field, read before trusting the rest of the document.
#[derive(Deserialize)]
struct Header {
    version: u32,
}

impl Snapshot {
    pub fn new(items: Vec<ReviewItem>, last_reset_date: String, new_cards_reviewed_today: u32) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            items,
            last_reset_date,
            new_cards_reviewed_today,
        }
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parses a stored document. A readable header with another version is reported
    /// separately from a document that cannot be parsed at all.
    pub fn decode(raw: &str) -> Result<Self, SnapshotError> {
        let header: Header = serde_json::from_str(raw).map_err(SnapshotError::Corrupt)?;
        if header.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(header.version));
        }
        serde_json::from_str(raw).map_err(SnapshotError::Corrupt)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("corrupt review data: {0}")]
    Corrupt(serde_json::Error),
    #[error("unsupported review data version {0}")]
    UnsupportedVersion(u32),
}
