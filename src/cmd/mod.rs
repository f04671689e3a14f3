//! CLI command implementations.
//!
//! Each submodule owns one `Commands` variant:
//!
//! | Module      | Commands handled |
//! |-------------|------------------|
//! | `compress`  | `Compress`       |
//! | `query`     | `Query`          |
//! | `recommend` | `Recommend`      |
//! | `ingest`    | `Ingest`         |
//! | `models`    | `Models`         |
//! | `serve`     | `Serve`          |
//! | `config`    | `Config`         |

pub mod compress;
pub mod config;
pub mod ingest;
pub mod models;
pub mod query;
pub mod recommend;
pub mod serve;

use std::path::Path;

use anyhow::Result;
use takc::config::TakcConfig;
use tracing::warn;

pub use compress::{CompressArgs, cmd_compress};
pub use config::cmd_config;
pub use ingest::{IngestArgs, cmd_ingest};
pub use models::cmd_models;
pub use query::cmd_query;
pub use recommend::cmd_recommend;
pub use serve::cmd_serve;

/// Resolve project configuration and report environment problems.
pub fn load_config(project_dir: &Path) -> Result<TakcConfig> {
    let config = TakcConfig::new(project_dir.to_path_buf())?;
    for warning in &config.env_warnings {
        warn!("{}", warning);
    }
    Ok(config)
}
