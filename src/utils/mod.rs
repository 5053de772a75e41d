//! Utility functions and helpers for adforge.
//!
//! This module provides cross-cutting concerns like structured logging,
//! secret redaction, and bounded retries with backoff.
//!
//! # Submodules
//!
//! - `logging`: Tracing initialization and API key sanitization.
//! - `retry`: Retry state machine and executor for upstream calls.
//!
//! Author: kelexine (<https://github.com/kelexine>)

pub mod logging;
pub mod retry;
