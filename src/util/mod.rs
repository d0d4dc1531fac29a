//! Utility functions module
//!
//! Formatting helpers shared by the reporter and the binary.

pub mod units;

pub use units::{format_count, format_duration, format_rate, progress_bar, BAR_WIDTH};
