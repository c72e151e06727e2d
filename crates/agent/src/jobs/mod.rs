//! Background job scheduler and job implementations.

mod location_report;
mod scheduler;

pub use location_report::LocationReportJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
pub(crate) use scheduler::TaskGuard;
