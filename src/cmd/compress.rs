//! Compression command: `takc compress`.

use std::path::Path;

use anyhow::{Context, Result};
use takc::compressor::{CompressionConfig, MultiRateOptions, MultiRateReport, StoredCompression};
use takc::config::TakcConfig;
use takc::prompt::default_task_description;
use takc::rate::CompressionRate;
use takc::runtime::Runtime;
use takc::summarizer::resolve_model_id;

pub struct CompressArgs<'a> {
    pub task_type: &'a str,
    pub context_file: &'a Path,
    pub rates: &'a [CompressionRate],
    pub task_description: Option<&'a str>,
    pub few_shot_examples: Option<&'a str>,
    pub model_id: Option<&'a str>,
    pub json: bool,
}

pub async fn cmd_compress(config: &TakcConfig, args: &CompressArgs<'_>) -> Result<()> {
    let context = std::fs::read_to_string(args.context_file)
        .with_context(|| format!("Failed to read context file: {}", args.context_file.display()))?;
    let runtime = Runtime::from_config(config)?;
    let model_id = args
        .model_id
        .map(resolve_model_id)
        .unwrap_or_else(|| runtime.model_id.clone());

    if let [rate] = args.rates {
        let task_description = args
            .task_description
            .map(str::to_string)
            .unwrap_or_else(|| default_task_description(args.task_type));
        let compression = CompressionConfig::for_rate(*rate, task_description)
            .with_model(model_id)
            .with_few_shot_examples(args.few_shot_examples.map(str::to_string));
        let compression = CompressionConfig {
            max_output_tokens: runtime.multi_rate.max_output_tokens,
            ..compression
        };
        let stored = runtime
            .compression
            .compress_and_store(args.task_type, &context, &compression)
            .await?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&stored.result)?);
        } else {
            print_single(args.task_type, &stored);
        }
        return Ok(());
    }

    let rates = if args.rates.is_empty() {
        CompressionRate::ALL.to_vec()
    } else {
        args.rates.to_vec()
    };
    let options = MultiRateOptions {
        task_description: args.task_description.map(str::to_string),
        few_shot_examples: args.few_shot_examples.map(str::to_string),
        model_identifier: model_id,
        rates,
        ..runtime.multi_rate.clone()
    };
    let report = runtime
        .compression
        .create_multi_rate_cache(args.task_type, &context, &options)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_single(task_type: &str, stored: &StoredCompression) {
    let result = &stored.result;
    println!();
    println!(
        "{} {} at {} ({}x target)",
        console::style("Compressed").green().bold(),
        task_type,
        result.rate,
        result.target_ratio
    );
    println!("  Cache key: {}", stored.cache_key);
    println!(
        "  Tokens: {} -> {} ({:.1}x achieved)",
        result.original_token_count, result.compressed_token_count, result.achieved_ratio
    );
    println!("  Chunks processed: {}", result.chunks_processed);
    println!();
}

pub(crate) fn print_report(report: &MultiRateReport) {
    println!();
    println!(
        "{}",
        console::style(format!("Multi-rate cache for {}", report.task_type))
            .bold()
            .cyan()
    );
    println!("─────────────────────────");
    println!("Original tokens: {}", report.original_tokens);
    for line in &report.rates {
        println!(
            "  {:<7} {:>3}x target  {:>6.1}x achieved  {:>6} tokens  {}",
            line.rate.as_str(),
            line.target_ratio,
            line.achieved_ratio,
            line.compressed_tokens,
            console::style(&line.cache_key).dim()
        );
    }
    println!("Completed in {} ms", report.duration_ms);
    println!();
}
