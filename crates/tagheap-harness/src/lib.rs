//! Trace-driven conformance harness for tagheap.
//!
//! This crate provides:
//! - Fixture loading: allocation traces as JSON reference data
//! - Replay: run each trace against a fresh heap, verifying payload
//!   integrity and whole-region consistency after every operation
//! - Report generation: human-readable + machine-readable run summaries

#![forbid(unsafe_code)]

pub mod error;
pub mod fixtures;
pub mod report;
pub mod runner;

pub use error::HarnessError;
pub use fixtures::{TraceCase, TraceOp, TraceSet};
pub use report::ConformanceReport;
pub use runner::{TraceRunner, VerificationResult};
