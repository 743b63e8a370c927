mod app;
mod cli;
mod commands;
mod observability;
mod output;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use cli::{Cli, Commands, ConfigCommands};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.format.unwrap_or_default();
    let config_path = app::resolve_config_path(cli.config.as_deref());

    let cfg = app::load_config(config_path.as_deref())?;
    observability::init_tracing(&cfg.logging);

    match &cli.command {
        Commands::Sync => {
            commands::sync::sync(&cfg, config_path, format).await?;
        }
        Commands::Daemon => {
            commands::sync::daemon(&cfg, config_path).await?;
        }
        Commands::Pending => {
            commands::documents::pending(&cfg, format).await?;
        }
        Commands::Attach(args) => {
            commands::documents::attach(&cfg, args).await?;
        }
        Commands::Import(args) => {
            commands::documents::import(&cfg, &args.file).await?;
        }
        Commands::Config(args) => match &args.command {
            ConfigCommands::Show => {
                let source = config_path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(defaults + environment)".to_string());
                println!("{}: {}", "Config".cyan(), source);
                println!("{}", cfg.to_redacted_toml()?);
            }
        },
    }

    Ok(())
}
