//! Driving-directions deep links for the day's route.

use reqwest::Url;

use domain::models::WorkItem;

const DIRECTIONS_BASE: &str = "https://www.google.com/maps/dir/";

/// Most stops a directions link may carry, origin and destination included.
pub const MAX_WAYPOINTS: usize = 10;

/// Directions link through `items` in order, capped at [`MAX_WAYPOINTS`].
///
/// Returns an empty string for an empty list; callers must not open it.
pub fn build_navigation_url(items: &[WorkItem]) -> String {
    build_navigation_url_with_limit(items, MAX_WAYPOINTS)
}

/// Same as [`build_navigation_url`] with a custom cap (at least 2).
pub fn build_navigation_url_with_limit(items: &[WorkItem], max_waypoints: usize) -> String {
    let stops: Vec<String> = items
        .iter()
        .take(max_waypoints.max(2))
        .map(WorkItem::navigation_label)
        .collect();

    let mut params: Vec<(&str, String)> = vec![("api", "1".to_string())];
    match stops.as_slice() {
        [] => return String::new(),
        [only] => params.push(("destination", only.clone())),
        [origin, between @ .., destination] => {
            params.push(("origin", origin.clone()));
            params.push(("destination", destination.clone()));
            if !between.is_empty() {
                params.push(("waypoints", between.join("|")));
            }
        }
    }
    params.push(("travelmode", "driving".to_string()));

    match Url::parse_with_params(DIRECTIONS_BASE, &params) {
        Ok(url) => url.into(),
        Err(e) => {
            tracing::error!(error = %e, "Could not build navigation link");
            String::new()
        }
    }
}
