//! Tracks how much CPU time each of your applications consumes, day by day.
//! A small daemon samples running processes on an interval, attributes CPU
//! deltas to installed software, and a cli exposes the aggregated numbers.
//!

pub mod cli;
pub mod daemon;
pub mod fs;
pub mod process_api;
pub mod resolver;
pub mod utils;
