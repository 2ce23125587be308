// src/config.rs

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound for the default worker count.
pub const MAX_DEFAULT_WORKERS: usize = 10;

/// Command-line interface.
///
/// Kept compatible with the historical `input output [max_workers]` invocation.
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Audit SPF/DKIM/DMARC, SOA, subdomains, HTTPS redirection and SRI coverage for a list of domains"
)]
pub struct Cli {
    /// Text file with one domain per line
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// CSV file to write results to
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Number of parallel workers (positional form)
    #[arg(value_name = "MAX_WORKERS", conflicts_with = "workers")]
    pub max_workers: Option<usize>,

    /// Number of parallel workers [default: min(10, 2 x CPUs)]
    #[arg(short, long)]
    pub workers: Option<usize>,
}

/// Timeouts and error policy for the DNS client.
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub primary_timeout: Duration,
    pub fallback_timeout: Duration,
    /// Report SERVFAIL-class failures as "not found" instead of an error.
    /// Useful behind restrictive resolvers; turning it off surfaces them.
    pub servfail_as_not_found: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            primary_timeout: Duration::from_secs(5),
            fallback_timeout: Duration::from_secs(3),
            servfail_as_not_found: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub max_redirects: usize,
    /// Upper bound on captured HTML, in bytes.
    pub body_cap: usize,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_redirects: 10,
            body_cap: 500_000,
            user_agent: format!("VanguardAudit/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Full configuration of one audit run.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub workers: usize,
    pub resolver: ResolverSettings,
    pub http: HttpSettings,
}

impl AuditConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        let workers = cli
            .workers
            .or(cli.max_workers)
            .unwrap_or_else(default_workers)
            .max(1);
        Self {
            input: cli.input.clone(),
            output: cli.output.clone(),
            workers,
            resolver: ResolverSettings::default(),
            http: HttpSettings::default(),
        }
    }
}

/// Roughly twice the available cores, capped at [`MAX_DEFAULT_WORKERS`].
pub fn default_workers() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    (cpus * 2).min(MAX_DEFAULT_WORKERS)
}
