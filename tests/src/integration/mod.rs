//! # Integration Scenarios
//!
//! Each module drives a complete `SyncLayer` through public operations only.

pub mod realtime;
pub mod scenarios;
pub mod submission;
