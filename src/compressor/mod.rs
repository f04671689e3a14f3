//! Task-aware compression of large contexts.
//!
//! A context is chunked into overlapping word windows, then folded through
//! the summarizer one chunk at a time. Results are written to the cache by
//! `CompressionService`.

mod iterative;
mod service;
mod types;

pub use iterative::{IterativeCompressor, target_tokens};
pub use service::{
    CompressionService, DEFAULT_MAX_CONCURRENT_RATES, MultiRateOptions, MultiRateReport, RateReport,
    StoredCompression,
};
pub use types::{CompressionConfig, CompressionResult, DEFAULT_MAX_OUTPUT_TOKENS, achieved_ratio};
