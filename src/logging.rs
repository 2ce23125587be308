// src/logging.rs

use color_eyre::eyre::Result;
use directories::ProjectDirs;
use lazy_static::lazy_static;
use std::path::PathBuf;
use tracing_error::ErrorLayer;
use tracing_subscriber::{self, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

lazy_static! {
    /// `VANGUARD_AUDIT_LOGLEVEL`, consulted when `RUST_LOG` is unset.
    static ref LOG_ENV: String = format!("{}_LOGLEVEL", env!("CARGO_CRATE_NAME").to_uppercase());
    static ref LOG_FILE: String = format!("{}.log", env!("CARGO_PKG_NAME"));
    /// Our own spans at `info`; hickory and reqwest stay quiet.
    static ref DEFAULT_DIRECTIVE: String = format!("{}=info", env!("CARGO_CRATE_NAME"));
}

/// Where the log file lives: the platform data-local directory, or `./.data`.
fn log_directory() -> PathBuf {
    ProjectDirs::from("com", "vanguard-rs", env!("CARGO_PKG_NAME"))
        .map(|dirs| dirs.data_local_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".").join(".data"))
}

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env(LOG_ENV.as_str()))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE.as_str()))
}

/// Sends tracing output to a fresh log file and returns its path.
///
/// The terminal carries only the banner, progress and summary lines.
pub fn initialize_logging() -> Result<PathBuf> {
    let directory = log_directory();
    std::fs::create_dir_all(&directory)?;
    let log_path = directory.join(LOG_FILE.as_str());
    let log_file = std::fs::File::create(&log_path)?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_filter(log_filter());

    tracing_subscriber::registry()
        .with(file_layer)
        .with(ErrorLayer::default())
        .init();

    Ok(log_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_derive_from_the_package() {
        assert_eq!(LOG_ENV.as_str(), "VANGUARD_AUDIT_LOGLEVEL");
        assert_eq!(LOG_FILE.as_str(), "vanguard-audit.log");
        assert_eq!(DEFAULT_DIRECTIVE.as_str(), "vanguard_audit=info");
    }

    #[test]
    fn log_directory_is_never_empty() {
        assert!(log_directory().components().count() > 0);
    }
}
