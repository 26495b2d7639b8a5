//! Runtime layer of the traffic audit.
//!
//! Memoizes computed report views by snapshot identity, filter and view
//! parameters so repeated requests over the same data are not recomputed.

pub mod cache;
pub mod report_views;

pub use traffic_core as core;
pub use traffic_data as data;
