mod config;
mod files;
mod http;
mod server;

use config::Config;
use tracing::level_filters::LevelFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;

    let max_level = if cfg.static_files.silent {
        LevelFilter::ERROR
    } else {
        LevelFilter::INFO
    };

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(max_level)
        .init();

    // A broken root is fatal before any connection is accepted.
    cfg.validate()?;

    tokio::select! {
        res = server::listener::run(&cfg) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    tracing::info!("Server closed");

    Ok(())
}
