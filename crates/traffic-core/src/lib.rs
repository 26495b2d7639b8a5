//! Core types for the traffic audit engine.
//!
//! Holds the record model, grouping keys, scoring thresholds, descriptive
//! statistics and the CLI settings shared by every other crate.

pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod stats;
pub mod thresholds;
pub mod time_utils;
