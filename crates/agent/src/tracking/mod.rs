//! Technician location tracking.

mod service;
mod subscribers;

pub use service::LocationTrackingService;
pub(crate) use service::WeakTracker;
pub use subscribers::{LocationCallback, Subscription};
