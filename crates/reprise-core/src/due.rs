//! Picks the items to review now, most urgent first.

use std::cmp::Ordering;

use crate::daily::DailyLimit;
use crate::item::ReviewItem;

/// Builds the review queue.
///
/// Rated items are due once `next_review_date <= now_ms`. Never-rated items are admitted
/// regardless of date while `used + admitted < limit`, counting admissions made in this
/// call. The queue is ordered by interval, then next review date, then path.
pub fn select_due<'a, I>(items: I, used: u32, limit: DailyLimit, now_ms: i64) -> Vec<ReviewItem>
where
    I: IntoIterator<Item = &'a ReviewItem>,
{
    let mut candidates: Vec<&ReviewItem> = items.into_iter().collect();
    candidates.sort_by(|a, b| by_urgency(a, b));

    let mut admitted_new = 0u32;
    let mut due = Vec::new();
    for item in candidates {
        if item.is_new {
            if limit.allows(used.saturating_add(admitted_new)) {
                admitted_new += 1;
                due.push(item.clone());
            }
        } else if item.is_due(now_ms) {
            due.push(item.clone());
        }
    }
    due
}

fn by_urgency(a: &ReviewItem, b: &ReviewItem) -> Ordering {
    a.interval
        .total_cmp(&b.interval)
        .then(a.next_review_date.cmp(&b.next_review_date))
        .then_with(|| a.path.cmp(&b.path))
}
