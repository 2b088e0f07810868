//! Paced, concurrent asset downloading.

mod rate_limit;
mod scheduler;

pub use rate_limit::RateLimiter;
pub use scheduler::{DownloadOutcome, DownloadResult, DownloadScheduler};
