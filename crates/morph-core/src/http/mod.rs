//! HTTP plumbing for provider calls
//!
//! This module provides:
//! - An OpenAI-compatible chat-completions adapter
//! - Error classification of HTTP failures
//! - Retry logic with exponential backoff

pub mod client;
pub mod error;
pub mod retry;

pub use client::{HttpConfig, HttpProvider};
pub use error::{FailureKind, HttpError};
pub use retry::{execute_with_retry, RetryDecision, RetryPolicy};
