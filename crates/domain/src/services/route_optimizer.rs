//! Visiting order for a technician's daily agenda.
//!
//! Items are clustered by city so the technician finishes one city before
//! driving to the next. Larger clusters go first; inside a cluster items are
//! visited in scheduled order. This is a grouping heuristic, not a distance
//! matrix solver, and it is pure: the same input list always yields the same
//! order, which keeps stop numbers stable across re-renders.

use chrono::NaiveTime;

use crate::models::WorkItem;

/// Bucket label for items without a city.
pub const NO_CITY: &str = "sin ciudad";

/// Items sharing one normalized city, in visiting order.
#[derive(Debug, Clone, PartialEq)]
pub struct CityGroup {
    /// Normalized key (trimmed, lowercase) or [`NO_CITY`].
    pub key: String,
    /// City as first written in the agenda, for display.
    pub label: String,
    pub items: Vec<WorkItem>,
}

/// A work item with its 1-based position in the visiting order.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteStop {
    pub stop_number: usize,
    pub item: WorkItem,
}

fn city_key(item: &WorkItem) -> String {
    item.city_name()
        .map(str::to_lowercase)
        .unwrap_or_else(|| NO_CITY.to_string())
}

/// Unscheduled items sort after every scheduled one.
fn schedule_key(item: &WorkItem) -> (bool, Option<NaiveTime>) {
    let time = item.scheduled_time_of_day();
    (time.is_none(), time)
}

/// Groups pending items by city, ordered largest group first.
///
/// Ties between equally sized groups keep the order in which each city first
/// appears in `items`.
pub fn city_groups(items: &[WorkItem]) -> Vec<CityGroup> {
    let mut groups: Vec<CityGroup> = Vec::new();

    for item in items.iter().filter(|i| !i.status.is_terminal()) {
        let key = city_key(item);
        match groups.iter_mut().find(|g| g.key == key) {
            Some(group) => group.items.push(item.clone()),
            None => groups.push(CityGroup {
                label: item.city_name().unwrap_or(NO_CITY).to_string(),
                key,
                items: vec![item.clone()],
            }),
        }
    }

    for group in &mut groups {
        group.items.sort_by_key(schedule_key);
    }
    // Stable sort keeps first-appearance order among equal sizes
    groups.sort_by(|a, b| b.items.len().cmp(&a.items.len()));
    groups
}

/// Returns the visiting order for `items`, excluding completed and cancelled.
pub fn optimize(items: &[WorkItem]) -> Vec<WorkItem> {
    city_groups(items)
        .into_iter()
        .flat_map(|group| group.items)
        .collect()
}

/// Visiting order with 1-based stop numbers attached.
pub fn plan_route(items: &[WorkItem]) -> Vec<RouteStop> {
    optimize(items)
        .into_iter()
        .enumerate()
        .map(|(index, item)| RouteStop {
            stop_number: index + 1,
            item,
        })
        .collect()
}
