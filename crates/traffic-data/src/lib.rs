//! Data layer of the traffic audit.
//!
//! Loads delimited traffic tables, validates and cleans them, rolls records up
//! into KPIs and grouped aggregates, scores pages and writes the results back
//! out as CSV.

pub mod aggregator;
pub mod analysis;
pub mod cleaner;
pub mod export;
pub mod filter;
pub mod insights;
pub mod reader;
pub mod scoring;
pub mod validator;
pub mod writer;

pub use traffic_core as core;
