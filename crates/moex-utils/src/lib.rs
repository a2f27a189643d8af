//! Shared utilities for the moex-agents workspace
//!
//! This crate provides common functionality used across the workspace:
//! tracing setup and date arithmetic for lookback windows.

pub mod dates;
pub mod logging;

pub use dates::{DateError, lookback_start, validate_date};
pub use logging::init_tracing;
