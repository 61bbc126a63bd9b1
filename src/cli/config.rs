use anyhow::Result;
use clap::{Args, Subcommand};

use super::output::{print_structured, OutputFormat};
use crate::cli::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration (file, defaults and environment overrides)
    Show,

    /// Validate the configuration
    Validate,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<()> {
    let path = ctx.config_path();
    match args.action {
        ConfigAction::Show => {
            let config = ctx.config();
            let format = match ctx.output() {
                OutputFormat::Human => OutputFormat::Yaml,
                other => other,
            };
            if matches!(ctx.output(), OutputFormat::Human) {
                println!("Current configuration ({}):", path.display());
            }
            print_structured(format, config)?;
        }
        ConfigAction::Validate => {
            // Loading already validated it; anything invalid never gets here.
            if ctx.config_from_file() {
                println!("Configuration file {} is valid", path.display());
            } else {
                println!(
                    "No configuration file at {}; defaults are valid",
                    path.display()
                );
            }
            let config = ctx.config();
            let identity = config.identity();
            if config.dispatch.endpoint.is_none()
                || config.dispatch.source_id.is_none()
                || !identity.is_complete()
            {
                println!("Note: endpoint, source id or identity missing; batches will stay queued");
            }
        }
    }

    Ok(())
}
