//! Document ingestion command: `takc ingest`.

use std::path::Path;

use anyhow::{Context, Result};
use takc::config::TakcConfig;
use takc::ingest::{IngestConfig, PreprocessStep};
use takc::runtime::Runtime;

pub struct IngestArgs<'a> {
    pub task_type: &'a str,
    pub source: &'a Path,
    pub chunk_size: Option<usize>,
    pub overlap: Option<usize>,
    pub steps: &'a [String],
    pub compress: bool,
}

pub async fn cmd_ingest(config: &TakcConfig, args: &IngestArgs<'_>) -> Result<()> {
    let text = std::fs::read_to_string(args.source)
        .with_context(|| format!("Failed to read source document: {}", args.source.display()))?;
    let runtime = Runtime::from_config(config)?;

    let preprocessing_steps = if args.steps.is_empty() {
        runtime.ingest_config.preprocessing_steps.clone()
    } else {
        args.steps
            .iter()
            .map(|s| s.parse::<PreprocessStep>())
            .collect::<Result<Vec<_>, _>>()?
    };
    let ingest_config = IngestConfig {
        chunk_size: args.chunk_size.unwrap_or(runtime.ingest_config.chunk_size),
        overlap: args.overlap.unwrap_or(runtime.ingest_config.overlap),
        preprocessing_steps,
    };

    let trigger = runtime
        .ingest
        .process_document(args.task_type, &text, &ingest_config)
        .await?;

    println!();
    println!(
        "{} {} chunks for {}",
        console::style("Stored").green().bold(),
        trigger.chunk_count,
        trigger.task_type
    );
    println!("  Location: {}", trigger.chunk_location);

    if !args.compress {
        println!();
        println!("Compression trigger:");
        println!("{}", serde_json::to_string_pretty(&trigger)?);
        println!();
        return Ok(());
    }

    let report = runtime.ingest.run_compression(&trigger).await?;
    super::compress::print_report(&report);
    Ok(())
}
