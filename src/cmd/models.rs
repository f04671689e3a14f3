//! Model catalog command: `takc models`.

use anyhow::Result;
use takc::config::TakcConfig;
use takc::runtime::Runtime;
use takc::summarizer::AVAILABLE_MODELS;

pub async fn cmd_models(config: &TakcConfig, test: bool) -> Result<()> {
    let runtime = if test {
        Some(Runtime::from_config(config)?)
    } else {
        None
    };

    println!();
    println!("{}", console::style("Available models").bold().cyan());
    println!("─────────────────────────");
    for (name, model_id) in AVAILABLE_MODELS {
        let marker = if *model_id == config.toml.model.model_id {
            "*"
        } else {
            " "
        };
        print!("{} {:<16} {}", marker, name, model_id);

        match &runtime {
            Some(runtime) => match runtime.summarizer.test_model_access(model_id).await {
                Ok(()) => println!("  {}", console::style("ok").green()),
                Err(e) => println!("  {} {}", console::style("failed:").red(), e),
            },
            None => println!(),
        }
    }
    println!();
    println!("* configured default ({})", config.toml.model.model_id);
    println!();
    Ok(())
}
