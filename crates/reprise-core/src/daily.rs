//! Daily budget for items reviewed for the first time.
//!
//! The counter is keyed by calendar day and resets lazily: whoever reads or writes it
//! passes today's date, and a different day than the stored one counts as zero.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_NEW_ITEMS_PER_DAY: u32 = 20;
pub const MAX_NEW_ITEMS_PER_DAY: u32 = 1000;
const UNLIMITED: i32 = -1;

/// How many never-reviewed items may be started per day.
/// Stored and configured as an integer where `-1` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum DailyLimit {
    Unlimited,
    PerDay(u32),
}

impl DailyLimit {
    /// Whether one more new item fits after `used` have been started today.
    pub fn allows(self, used: u32) -> bool {
        match self {
            DailyLimit::Unlimited => true,
            DailyLimit::PerDay(limit) => used < limit,
        }
    }
}

impl Default for DailyLimit {
    fn default() -> Self {
        DailyLimit::PerDay(DEFAULT_NEW_ITEMS_PER_DAY)
    }
}

impl TryFrom<i32> for DailyLimit {
    type Error = InvalidLimit;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            UNLIMITED => Ok(DailyLimit::Unlimited),
            n if (1..=MAX_NEW_ITEMS_PER_DAY as i32).contains(&n) => Ok(DailyLimit::PerDay(n as u32)),
            _ => Err(InvalidLimit(value)),
        }
    }
}

impl From<DailyLimit> for i32 {
    fn from(limit: DailyLimit) -> Self {
        match limit {
            DailyLimit::Unlimited => UNLIMITED,
            DailyLimit::PerDay(n) => n as i32,
        }
    }
}

/// Calendar-day key stored alongside the counter.
pub fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

/// New items reviewed on `last_reset_date`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyCounter {
    last_reset_date: String,
    new_items_reviewed_today: u32,
}

impl DailyCounter {
    pub fn new(today: NaiveDate) -> Self {
        Self::restore(day_key(today), 0)
    }

    /// Counter as persisted; a stale date is fine, it resets on first use.
    pub fn restore(last_reset_date: String, new_items_reviewed_today: u32) -> Self {
        Self {
            last_reset_date,
            new_items_reviewed_today,
        }
    }

    /// New items started on `today`.
    pub fn used_on(&self, today: NaiveDate) -> u32 {
        if self.last_reset_date == day_key(today) {
            self.new_items_reviewed_today
        } else {
            0
        }
    }

    /// Resets the count if `today` is a different day.
    pub fn refresh(&mut self, today: NaiveDate) {
        let key = day_key(today);
        if self.last_reset_date == key {
            return;
        }
        log::debug!("new day {key}: resetting new-item counter (was {})", self.new_items_reviewed_today);
        self.last_reset_date = key;
        self.new_items_reviewed_today = 0;
    }

    pub fn record_new_item(&mut self, today: NaiveDate) {
        self.refresh(today);
        self.new_items_reviewed_today += 1;
    }

    pub fn info(&self, today: NaiveDate, limit: DailyLimit) -> DailyLimitInfo {
        let used = self.used_on(today);
        match limit {
            DailyLimit::Unlimited => DailyLimitInfo {
                used,
                limit: UNLIMITED,
                remaining: UNLIMITED,
            },
            DailyLimit::PerDay(n) => DailyLimitInfo {
                used,
                limit: n as i32,
                remaining: n.saturating_sub(used) as i32,
            },
        }
    }

    pub fn last_reset_date(&self) -> &str {
        &self.last_reset_date
    }

    pub fn new_items_reviewed_today(&self) -> u32 {
        self.new_items_reviewed_today
    }
}

/// Budget summary. `limit` and `remaining` are `-1` when unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyLimitInfo {
    pub used: u32,
    pub limit: i32,
    pub remaining: i32,
}

#[derive(Debug, thiserror::Error)]
#[error("new items per day must be -1 (unlimited) or between 1 and 1000, got {0}")]
pub struct InvalidLimit(pub i32);
