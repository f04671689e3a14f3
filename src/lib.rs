pub mod cache;
pub mod chunker;
pub mod compressor;
pub mod config;
pub mod errors;
pub mod ingest;
pub mod prompt;
pub mod query;
pub mod rate;
pub mod runtime;
pub mod server;
pub mod summarizer;
pub mod telemetry;
