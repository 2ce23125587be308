// src/main.rs

use clap::Parser;
use color_eyre::eyre::Result;
use tracing::{error, info};

mod app;
mod config;
mod core;
mod error;
mod export;
mod logging;

use app::App;
use config::{AuditConfig, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let log_path = logging::initialize_logging()?;
    let config = AuditConfig::from_cli(&cli);

    eprintln!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    eprintln!("Platform: {} ({})", std::env::consts::OS, std::env::consts::ARCH);
    eprintln!("Input file: {}", config.input.display());
    eprintln!("Output file: {}", config.output.display());
    eprintln!("Worker threads: {}", config.workers);
    eprintln!("Log file: {}", log_path.display());
    info!(input = %config.input.display(), output = %config.output.display(), workers = config.workers, "Audit configured.");

    let app = App::new(config);
    let cancel = app.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted: finishing in-flight domains, no new ones will start.");
            cancel.cancel();
        }
    });

    match app.run().await {
        Ok(summary) => {
            if summary.interrupted {
                eprintln!(
                    "Partial results: {}/{} domains written to {}",
                    summary.rows_written,
                    summary.total_domains,
                    summary.output.display()
                );
            } else {
                eprintln!(
                    "Analysis complete: {} domains written to {} in {:.1}s",
                    summary.rows_written,
                    summary.output.display(),
                    summary.elapsed.as_secs_f64()
                );
            }
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Batch failed.");
            Err(e.into())
        }
    }
}
