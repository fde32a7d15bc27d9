//! SM-2 style spacing: next interval, ease and repetition count from a recall rating.
//!
//! Ratings map onto SM-2 qualities as again → 0, hard → 2, good → 3, easy → 5.
//! Qualities 1 and 4 are never produced.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::item::ReviewItem;

/// Lower bound for the ease factor.
pub const MIN_EASE_FACTOR: f64 = 1.3;
/// Interval bounds (days) for the successful path.
pub const MIN_INTERVAL: f64 = 1.0;
pub const MAX_INTERVAL: f64 = 365.0;

/// Interval stored after an "again" rating: roughly 15 minutes, in days.
pub const AGAIN_INTERVAL: f64 = 0.0104;
/// Delay before an "again" item comes back.
pub const AGAIN_DELAY_MS: i64 = 15 * 60 * 1000;

const EASY_BONUS: f64 = 1.3;
const HARD_PENALTY: f64 = 0.6;

/// How well a document was recalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Again,
    Hard,
    Good,
    Easy,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    /// SM-2 quality for this rating.
    pub fn quality(self) -> u8 {
        match self {
            Rating::Again => 0,
            Rating::Hard => 2,
            Rating::Good => 3,
            Rating::Easy => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Rating::Again => "again",
            Rating::Hard => "hard",
            Rating::Good => "good",
            Rating::Easy => "easy",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the rating names or the button numbers 1-4 (again, hard, good, easy).
impl FromStr for Rating {
    type Err = RatingParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "again" | "1" => Ok(Rating::Again),
            "hard" | "2" => Ok(Rating::Hard),
            "good" | "3" => Ok(Rating::Good),
            "easy" | "4" => Ok(Rating::Easy),
            _ => Err(RatingParseError(s.to_string())),
        }
    }
}

/// New scheduling values produced by [`compute_next`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleOutcome {
    pub interval: f64,
    pub repetitions: u32,
    pub ease_factor: f64,
}

/// Computes the next interval (days), repetition count and ease factor.
///
/// A quality below 3 resets the learning phase: one day, zero repetitions, ease untouched.
/// Otherwise the ease moves by the SM-2 delta (floored at [`MIN_EASE_FACTOR`] and kept at one
/// decimal place), the first two successes give 1 and 6 days, later ones multiply the previous
/// interval by the new ease. Quality modifiers apply before clamping to 1..=365 days.
pub fn compute_next(quality: u8, repetitions: u32, ease_factor: f64, interval: f64) -> ScheduleOutcome {
    if quality < 3 {
        return ScheduleOutcome {
            interval: MIN_INTERVAL,
            repetitions: 0,
            ease_factor,
        };
    }

    let q = f64::from(5 - quality.min(5));
    let ease_factor = round_to(
        (ease_factor + (0.1 - q * (0.08 + q * 0.02))).max(MIN_EASE_FACTOR),
        1,
    );
    let repetitions = repetitions + 1;
    let base = match repetitions {
        1 => 1.0,
        2 => 6.0,
        _ => interval * ease_factor,
    };
    let interval = (base * quality_modifier(quality)).clamp(MIN_INTERVAL, MAX_INTERVAL);

    ScheduleOutcome {
        interval: round_to(interval, 2),
        repetitions,
        ease_factor,
    }
}

/// Interval multiplier for a quality: easy stretches, hard shrinks.
pub fn quality_modifier(quality: u8) -> f64 {
    match quality {
        5 => EASY_BONUS,
        2 => HARD_PENALTY,
        _ => 1.0,
    }
}

/// Interval (days) each rating would give `item`, in [`Rating::ALL`] order.
pub fn preview(item: &ReviewItem) -> [f64; 4] {
    Rating::ALL.map(|rating| match rating {
        Rating::Again => AGAIN_INTERVAL,
        _ => {
            compute_next(rating.quality(), item.repetitions, item.ease_factor, item.interval).interval
        }
    })
}

/// Short label for an interval in days, e.g. `15m`, `1d`, `2w`, `3mo`, `1y`.
pub fn format_interval(days: f64) -> String {
    if days < 1.0 {
        let minutes = (days * 24.0 * 60.0).round() as i64;
        return if minutes < 60 {
            format!("{}m", minutes.max(1))
        } else {
            format!("{}h", minutes / 60)
        };
    }
    let days = days.round() as i64;
    if days < 7 {
        format!("{}d", days)
    } else if days < 30 {
        format!("{}w", days / 7)
    } else if days < 365 {
        format!("{}mo", days / 30)
    } else {
        format!("{}y", days / 365)
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[derive(Debug, thiserror::Error)]
#[error("unknown rating {0:?} (expected again, hard, good, easy or 1-4)")]
pub struct RatingParseError(String);
