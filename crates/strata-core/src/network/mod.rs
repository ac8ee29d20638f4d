//! Network utilities for the backing store.
//!
//! This module provides:
//! - Retry logic with exponential backoff and jitter
//! - HTTP client with rate limiting awareness and store error mapping

mod client;
mod retry;

pub use client::{HttpClient, RateLimitState};
pub use retry::{retry_async, RetryConfig, RetryStats};
