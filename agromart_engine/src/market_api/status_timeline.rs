//! Per-status timestamps for display.
//!
//! A seller may move an order forward several steps at once, e.g. straight from `Pending` to `Delivered`. The skipped
//! statuses were never entered, so they have no history entry. The timeline fills them in with synthetic times
//! backdated in 100 ms steps from the next status that was actually entered. When the gap to the preceding status is
//! too small for 100 ms steps, the gap is divided evenly instead, so that the timeline stays strictly increasing.
//!
//! Synthetic timestamps are for display only. Nothing in the engine reads them back.
use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::{
    db_types::{Order, OrderStatusType, StatusChange, STATUS_PROGRESSION},
    order_objects::{StatusTimeline, StatusTimestamp},
};

pub const SYNTHETIC_STEP_MS: i64 = 100;

/// Derives the timeline of `order` from its status history.
///
/// * `Pending` is always the order's `created_at`.
/// * Every other status that was entered gets the time it was most recently entered.
/// * Statuses skipped on the way to the current status get synthetic times.
/// * A cancelled order shows `Pending` and `Cancelled` only.
pub fn derive_timeline(order: &Order, history: &[StatusChange]) -> StatusTimeline {
    let mut entered: HashMap<OrderStatusType, DateTime<Utc>> = HashMap::new();
    for change in history {
        entered.insert(change.status, change.occurred_at);
    }
    entered.insert(OrderStatusType::Pending, order.created_at);
    // The current status was entered, even if its history entry is missing
    entered.entry(order.status).or_insert(order.updated_at);

    let timestamps = match order.status.rank() {
        None => vec![authentic(OrderStatusType::Pending, &entered), authentic(order.status, &entered)]
            .into_iter()
            .flatten()
            .collect(),
        Some(current) => fill_progression(&STATUS_PROGRESSION[..=current], &entered),
    };
    StatusTimeline { order_id: order.order_id.clone(), status: order.status, timestamps }
}

fn authentic(status: OrderStatusType, entered: &HashMap<OrderStatusType, DateTime<Utc>>) -> Option<StatusTimestamp> {
    entered.get(&status).map(|at| StatusTimestamp { status, at: *at, synthetic: false })
}

fn fill_progression(
    statuses: &[OrderStatusType],
    entered: &HashMap<OrderStatusType, DateTime<Utc>>,
) -> Vec<StatusTimestamp> {
    let mut result = Vec::with_capacity(statuses.len());
    let mut skipped: Vec<OrderStatusType> = Vec::new();
    for status in statuses {
        let Some(stamp) = authentic(*status, entered) else {
            skipped.push(*status);
            continue;
        };
        if !skipped.is_empty() {
            let previous = result.last().map(|s: &StatusTimestamp| s.at);
            result.extend(backdate(&skipped, previous, stamp.at));
            skipped.clear();
        }
        result.push(stamp);
    }
    result
}

/// Synthetic times for a run of skipped statuses that ends at `next`. The step is 100 ms, shrunk if needed so that
/// every synthetic time lies strictly between `previous` and `next`.
fn backdate(skipped: &[OrderStatusType], previous: Option<DateTime<Utc>>, next: DateTime<Utc>) -> Vec<StatusTimestamp> {
    let slots = skipped.len() as i32 + 1;
    let mut step = Duration::milliseconds(SYNTHETIC_STEP_MS);
    if let Some(prev) = previous {
        let gap = next - prev;
        if gap < step * slots {
            step = (gap / slots).max(Duration::zero());
        }
    }
    skipped
        .iter()
        .enumerate()
        .map(|(i, status)| {
            let steps_back = slots - 1 - i as i32;
            StatusTimestamp { status: *status, at: next - step * steps_back, synthetic: true }
        })
        .collect()
}
