//! Scheduling state of one tracked document, and counts over a set of them.

use serde::{Deserialize, Serialize};

pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
pub const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Review state for a tracked document, keyed by its path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewItem {
    pub path: String,
    /// Current interval in days.
    pub interval: f64,
    pub ease_factor: f64,
    /// Consecutive successful reviews.
    pub repetitions: u32,
    /// Epoch milliseconds.
    pub next_review_date: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_review_date: Option<i64>,
    /// True until the first rating.
    pub is_new: bool,
}

impl ReviewItem {
    /// A freshly tracked item, due immediately.
    pub fn new(path: impl Into<String>, now_ms: i64) -> Self {
        Self {
            path: path.into(),
            interval: 1.0,
            ease_factor: DEFAULT_EASE_FACTOR,
            repetitions: 0,
            next_review_date: now_ms,
            last_review_date: None,
            is_new: true,
        }
    }

    pub fn is_due(&self, now_ms: i64) -> bool {
        self.next_review_date <= now_ms
    }

    pub fn stage(&self) -> Stage {
        if self.is_new {
            Stage::New
        } else if self.repetitions == 0 || self.interval < 1.0 {
            Stage::Learning
        } else {
            Stage::Review
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Never rated.
    New,
    /// Rated, but no successful streak yet (or waiting on a sub-day "again" delay).
    Learning,
    Review,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStatistics {
    pub total: usize,
    pub due: usize,
    pub new: usize,
    pub learning: usize,
    pub review: usize,
}

impl ReviewStatistics {
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a ReviewItem>, now_ms: i64) -> Self {
        let mut stats = Self::default();
        for item in items {
            stats.total += 1;
            if item.is_due(now_ms) {
                stats.due += 1;
            }
            match item.stage() {
                Stage::New => stats.new += 1,
                Stage::Learning => stats.learning += 1,
                Stage::Review => stats.review += 1,
            }
        }
        stats
    }
}
