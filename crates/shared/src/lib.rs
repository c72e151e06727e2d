//! Shared utilities and common types for the FieldTech workspace.
//!
//! This crate provides common functionality used across all other crates:
//! - Validation of outbound location and payment payloads
//! - Colombia local-time helpers for schedule handling

pub mod time;
pub mod validation;
