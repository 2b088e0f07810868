//! Network layer shared by catalog fetches and asset downloads.
//!
//! This module provides:
//! - A pooled HTTP client pair with a fixed identifying `User-Agent`
//! - The fetch seams ([`JsonSource`], [`AssetSource`]) the resolver and
//!   scheduler are written against
//! - Retry logic with a fixed delay for catalog fetches

mod client;
mod retry;

pub use client::{AssetSource, HttpClient, JsonSource};
pub use retry::{RetryConfig, RetryStats, retry_async};
