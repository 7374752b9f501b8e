//! Network utilities for provider HTTP calls.
//!
//! This module provides:
//! - reqwest client construction with bounded per-request timeouts
//! - response status classification (retryable, permanent, rate limited)
//! - retry logic with exponential backoff and jitter

mod client;
mod retry;

pub use client::{build_client, extract_domain, get_json, is_permanent_failure, is_retryable_status};
pub use retry::{retry_async, retry_async_with_hint, RetryConfig, RetryStats};
