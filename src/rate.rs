//! Compression rates and the two rate-selection policies.
//!
//! | Rate     | Target ratio | Typical use                         |
//! |----------|--------------|-------------------------------------|
//! | `Ultra`  | 64×          | Short factual lookups               |
//! | `High`   | 32×          | Default for moderate questions      |
//! | `Medium` | 16×          | Analytical, multi-fact questions    |
//! | `Light`  | 8×           | Large corpora with complex analysis |
//!
//! Two independent policies pick a rate:
//! - **content-driven** (`recommend`): table over data size and complexity
//! - **query-driven** (`classify_query` + `select_rate`): keyword heuristics
//!
//! The two are not required to agree; callers pick the one that fits.

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Discrete compression aggressiveness, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionRate {
    Ultra,
    High,
    Medium,
    Light,
}

impl CompressionRate {
    /// All rates in descending compression strength.
    pub const ALL: [CompressionRate; 4] = [
        CompressionRate::Ultra,
        CompressionRate::High,
        CompressionRate::Medium,
        CompressionRate::Light,
    ];

    /// Target original/compressed word ratio for this rate.
    pub fn target_ratio(self) -> u32 {
        match self {
            CompressionRate::Ultra => 64,
            CompressionRate::High => 32,
            CompressionRate::Medium => 16,
            CompressionRate::Light => 8,
        }
    }

    /// Chunk size and overlap (words) used when building the multi-rate cache.
    /// The strongest rates work on smaller windows.
    pub fn default_chunking(self) -> (usize, usize) {
        match self {
            CompressionRate::Ultra | CompressionRate::High => (512, 64),
            CompressionRate::Medium | CompressionRate::Light => (1024, 128),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompressionRate::Ultra => "ultra",
            CompressionRate::High => "high",
            CompressionRate::Medium => "medium",
            CompressionRate::Light => "light",
        }
    }
}

impl std::fmt::Display for CompressionRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CompressionRate {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ultra" => Ok(CompressionRate::Ultra),
            "high" => Ok(CompressionRate::High),
            "medium" => Ok(CompressionRate::Medium),
            "light" => Ok(CompressionRate::Light),
            _ => Err(ConfigError::InvalidRate(s.to_string())),
        }
    }
}

/// Coarse complexity of a query or workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryComplexity {
    Simple,
    Moderate,
    Complex,
}

impl std::fmt::Display for QueryComplexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryComplexity::Simple => write!(f, "simple"),
            QueryComplexity::Moderate => write!(f, "moderate"),
            QueryComplexity::Complex => write!(f, "complex"),
        }
    }
}

impl std::str::FromStr for QueryComplexity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" => Ok(QueryComplexity::Simple),
            "moderate" => Ok(QueryComplexity::Moderate),
            "complex" => Ok(QueryComplexity::Complex),
            _ => Err(ConfigError::InvalidComplexity(s.to_string())),
        }
    }
}

const SIMPLE_KEYWORDS: &[&str] = &["what", "when", "who", "total", "sum", "revenue", "profit"];
const COMPLEX_KEYWORDS: &[&str] = &[
    "analyze",
    "compare",
    "explain",
    "why",
    "how",
    "relationship",
    "trend",
];

/// Queries at or above this many words are never classified as simple.
const SIMPLE_MAX_WORDS: usize = 10;

const ULTRA_MAX_WORDS: usize = 50_000;
const MEDIUM_MAX_WORDS: usize = 100_000;

/// Content-driven policy: pick a rate from workload size and complexity.
///
/// `_task_type` is accepted for signature stability; the table does not
/// currently differentiate by task.
pub fn recommend(
    _task_type: &str,
    data_size_words: usize,
    complexity: QueryComplexity,
) -> CompressionRate {
    match complexity {
        QueryComplexity::Simple if data_size_words < ULTRA_MAX_WORDS => CompressionRate::Ultra,
        QueryComplexity::Simple | QueryComplexity::Moderate => CompressionRate::High,
        QueryComplexity::Complex if data_size_words < MEDIUM_MAX_WORDS => CompressionRate::Medium,
        QueryComplexity::Complex => CompressionRate::Light,
    }
}

/// Query-driven classifier. Keywords are matched as substrings of the
/// lower-cased query; the simple check runs first.
pub fn classify_query(query: &str) -> QueryComplexity {
    let lower = query.to_lowercase();
    let word_count = query.split_whitespace().count();

    if SIMPLE_KEYWORDS.iter().any(|k| lower.contains(k)) && word_count < SIMPLE_MAX_WORDS {
        return QueryComplexity::Simple;
    }
    if COMPLEX_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return QueryComplexity::Complex;
    }
    QueryComplexity::Moderate
}

/// Query-driven rate mapping.
pub fn select_rate(complexity: QueryComplexity) -> CompressionRate {
    match complexity {
        QueryComplexity::Simple => CompressionRate::Ultra,
        QueryComplexity::Moderate => CompressionRate::High,
        QueryComplexity::Complex => CompressionRate::Medium,
    }
}

/// Query-driven rate mapping for a complexity label from outside the crate.
/// Unknown labels map to `High`.
pub fn select_rate_named(complexity: &str) -> CompressionRate {
    complexity
        .parse::<QueryComplexity>()
        .map(select_rate)
        .unwrap_or(CompressionRate::High)
}
