//! Domain services for the technician agent.
//!
//! Services contain pure business logic that operates on domain models.

pub mod route_optimizer;

pub use route_optimizer::{city_groups, optimize, plan_route, CityGroup, RouteStop, NO_CITY};
