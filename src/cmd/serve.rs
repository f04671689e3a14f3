//! HTTP server command: `takc serve`.

use anyhow::Result;
use takc::config::TakcConfig;
use takc::runtime::Runtime;
use takc::server::{ServerConfig, start_server};

pub async fn cmd_serve(config: &TakcConfig, port: u16, dev: bool) -> Result<()> {
    let runtime = Runtime::from_config(config)?;
    start_server(
        ServerConfig {
            port,
            dev_mode: dev,
        },
        runtime,
    )
    .await
}
