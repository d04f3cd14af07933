mod main_runtime;

use clap::Parser;
use qtrader::cli::{Cli, Commands};
use qtrader::config::AppConfig;
use tracing::info;

use main_runtime::{init_logging, init_logging_simple};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.command.is_quiet() {
        init_logging_simple();
    }
    if let Commands::Config(cmd) = &cli.command {
        return cmd.run(&cli.config_dir);
    }

    let config = AppConfig::load_from(&cli.config_dir)?;
    if !cli.command.is_quiet() {
        init_logging(&config.logging, cli.json_logs);
    }

    match cli.command {
        Commands::Train(args) => {
            info!("Starting training run on {:?}", args.data);
            args.run(config)?;
        }
        Commands::Eval(args) => {
            args.run(config)?;
        }
        Commands::Compare(args) => {
            args.run(config)?;
        }
        Commands::Signal(args) => {
            info!("Starting signal replay from {:?}", args.data);
            args.run(config).await?;
        }
        Commands::Labels(args) => {
            args.run(config)?;
        }
        Commands::Config(_) => {}
    }

    Ok(())
}
