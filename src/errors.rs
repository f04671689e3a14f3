//! Typed error hierarchy for takc.
//!
//! Five enums cover the five failure surfaces:
//! - `ConfigError`: invalid rates, chunking parameters, request fields
//! - `BackendError`: generation capability failures (transient vs permanent)
//! - `TierError`: a single cache tier failing for a reason other than "not found"
//! - `CacheError`: cache reads that no tier can answer
//! - `IngestError`: storing chunks or compressing them back out of the store

use thiserror::Error;

/// Invalid user- or file-supplied configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid compression rate '{0}'. Valid values: ultra, high, medium, light")]
    InvalidRate(String),

    #[error("Invalid chunking: overlap {overlap} must be smaller than chunk size {chunk_size}")]
    InvalidChunking { chunk_size: usize, overlap: usize },

    #[error("Invalid query complexity '{0}'. Valid values: simple, moderate, complex")]
    InvalidComplexity(String),

    #[error("Missing required parameter: {0}")]
    MissingField(&'static str),

    #[error("Invalid chunk location '{0}': expected scheme://bucket/prefix")]
    InvalidLocation(String),

    #[error("Unknown preprocessing step '{0}'")]
    UnknownPreprocessingStep(String),
}

/// Message fragments that mark a backend failure as worth retrying.
const TRANSIENT_MARKERS: &[&str] = &[
    "throttling",
    "rate limit",
    "too many requests",
    "quota exceeded",
];

/// Failures of the external generation capability.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Transient backend failure: {0}")]
    Transient(String),

    #[error("Backend failure: {0}")]
    Permanent(String),

    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),
}

impl BackendError {
    /// Classify a raw failure message. Only rate-limit style signals are transient.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if TRANSIENT_MARKERS.iter().any(|m| lower.contains(m)) {
            BackendError::Transient(message)
        } else {
            BackendError::Permanent(message)
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transient(_))
    }
}

/// A cache tier failed for a reason other than the key being absent.
#[derive(Debug, Error)]
pub enum TierError {
    #[error("Tier I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tier backend error: {0}")]
    Backend(String),
}

/// Cache reads that no tier could answer.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache entry {cache_key} is unreadable: {reason}")]
    Unreadable { cache_key: String, reason: String },
}

/// Failures while chunking a document into the store or compressing a
/// previously ingested one.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("No chunks to compress for task type '{task_type}' at {location}")]
    NoChunks { task_type: String, location: String },

    #[error("Chunk {key} not found at {location}")]
    DocumentNotFound { key: String, location: String },

    #[error("Chunk {key} is not UTF-8")]
    NotUtf8 { key: String },

    #[error("Failed to access chunk {key}: {source}")]
    Tier {
        key: String,
        #[source]
        source: TierError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_detects_rate_limit_signals() {
        for msg in [
            "ThrottlingException: slow down",
            "Rate limit reached for model",
            "429 Too Many Requests",
            "Quota exceeded for account",
        ] {
            assert!(BackendError::classify(msg).is_transient(), "{msg}");
        }
    }

    #[test]
    fn classify_treats_everything_else_as_permanent() {
        let err = BackendError::classify("AccessDeniedException: not authorized");
        assert!(matches!(err, BackendError::Permanent(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn unsupported_model_is_not_transient() {
        let err = BackendError::UnsupportedModel("cohere.command".into());
        assert!(!err.is_transient());
        assert!(err.to_string().contains("cohere.command"));
    }

    #[test]
    fn config_error_invalid_chunking_carries_values() {
        let err = ConfigError::InvalidChunking {
            chunk_size: 10,
            overlap: 10,
        };
        match &err {
            ConfigError::InvalidChunking {
                chunk_size,
                overlap,
            } => {
                assert_eq!(*chunk_size, 10);
                assert_eq!(*overlap, 10);
            }
            _ => panic!("Expected InvalidChunking"),
        }
        assert!(err.to_string().contains("overlap 10"));
    }

    #[test]
    fn tier_error_converts_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: TierError = io_err.into();
        assert!(matches!(err, TierError::Io(_)));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&ConfigError::MissingField("query"));
        assert_std_error(&BackendError::Permanent("x".into()));
        assert_std_error(&TierError::Backend("x".into()));
        assert_std_error(&CacheError::Unreadable {
            cache_key: "takc:t:ultra".into(),
            reason: "bad json".into(),
        });
        assert_std_error(&IngestError::NotUtf8 {
            key: "t/chunk_0000.txt".into(),
        });
    }

    #[test]
    fn ingest_error_keeps_tier_source() {
        use std::error::Error as _;
        let err = IngestError::Tier {
            key: "t/chunk_0001.txt".into(),
            source: TierError::Backend("disk full".into()),
        };
        assert!(err.to_string().contains("t/chunk_0001.txt"));
        assert!(err.source().is_some_and(|s| s.to_string().contains("disk full")));
    }
}
