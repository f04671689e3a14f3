//! Query command: `takc query`.

use anyhow::Result;
use takc::config::TakcConfig;
use takc::rate::CompressionRate;
use takc::runtime::Runtime;

pub async fn cmd_query(
    config: &TakcConfig,
    task_type: &str,
    query: &str,
    rate: Option<CompressionRate>,
    json: bool,
) -> Result<()> {
    let runtime = Runtime::from_config(config)?;
    let response = runtime.responder.answer(query, task_type, rate).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!();
    if response.cache_hit {
        println!(
            "{} {} ({} rate)",
            console::style("Answer").green().bold(),
            console::style(&response.task_type).dim(),
            response.rate_used
        );
    } else {
        println!(
            "{} {} ({} rate)",
            console::style("Cache miss").yellow().bold(),
            console::style(&response.task_type).dim(),
            response.rate_used
        );
    }
    println!();
    println!("{}", response.response);
    if let Some(info) = &response.cache_info {
        println!();
        let mut line = format!(
            "cache v{}: {} -> {} tokens, {} chunks, model {}",
            info.version,
            info.original_tokens,
            info.compressed_tokens,
            info.chunks_processed,
            info.model_used
        );
        if let Some(written) = info.written_at() {
            line.push_str(&format!(", written {}", written.format("%Y-%m-%d %H:%M UTC")));
        }
        println!("{}", console::style(line).dim());
    }
    println!();
    Ok(())
}
