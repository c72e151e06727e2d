pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod navigation;
pub mod positioning;
pub(crate) mod sync;
pub mod timer;
pub mod tracking;
pub mod workflow;
