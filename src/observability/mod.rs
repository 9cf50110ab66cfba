//! Structured logging for catalog operations.
//!
//! Logging is synchronous, read-only and must never affect the outcome
//! of the operation being logged.

mod logger;

pub use logger::{Logger, Severity};
