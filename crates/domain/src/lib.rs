//! Domain layer for the FieldTech technician agent.
//!
//! This crate contains:
//! - Domain models (location samples and reports, installations, timers)
//! - Pure business logic (route ordering)
//! - Domain error types

pub mod models;
pub mod services;
