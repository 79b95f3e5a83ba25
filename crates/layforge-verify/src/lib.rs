//! # Layforge Verify
//!
//! Read-only checks run on a finished layout: short detection over the
//! flattened geometry and the schematic connectivity report.

pub mod report;
pub mod shorts;

pub use report::{verify, ConnectivityReport, VerificationReport};
pub use shorts::{check_shorts, Short, ShortCheckResult};
