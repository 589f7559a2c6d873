// src/main.rs — Manifix entry point

use clap::Parser;

use manifix::cli::{Cli, Commands};
use manifix::infra::config::Config;
use manifix::infra::daemon::{run_service, Service, ServiceMode};
use manifix::infra::logger;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Long-running modes log at info, one-shot commands only warn.
    let long_running = matches!(cli.command, None | Some(Commands::Serve) | Some(Commands::Watch));
    let level = match (cli.verbose, long_running) {
        (true, _) => "debug",
        (false, true) => "info",
        (false, false) => "warn",
    };
    logger::init_logging(level);

    // Load config (falls back to defaults if no config.toml)
    let config = match cli.config {
        Some(ref path) => Config::load_from(path)?.with_env_overrides()?.normalized(),
        None => Config::load()?,
    };

    match cli.command {
        None | Some(Commands::Serve) => run_service(Service::new(config), ServiceMode::Serve).await,
        Some(Commands::Watch) => run_service(Service::new(config), ServiceMode::WatchOnly).await,
        Some(Commands::Analyze { file, json }) => {
            manifix::cli::inspect::run_analyze(&config, &file, json).await
        }
        Some(Commands::Fix { file, out_dir }) => {
            manifix::cli::inspect::run_fix(&config, &file, out_dir).await
        }
        Some(Commands::Repair { file, out_dir }) => {
            manifix::cli::repair::run_repair(&config, &file, out_dir).await
        }
        Some(Commands::Convert { file, to, out_dir }) => {
            manifix::cli::convert::run_convert(&config, &file, &to, out_dir).await
        }
    }
}
