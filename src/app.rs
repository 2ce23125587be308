// src/app.rs

use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::fs::File;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::AuditConfig;
use crate::core::batch::run_batch;
use crate::core::resolver::ResolverClient;
use crate::core::scanner::DomainAuditor;
use crate::core::scanner::transport_scanner::ReqwestFetcher;
use crate::error::{AuditError, Result};
use crate::export::write_csv;

/// Summary of a finished (or interrupted) run.
#[derive(Debug)]
pub struct RunSummary {
    pub total_domains: usize,
    pub rows_written: usize,
    pub interrupted: bool,
    pub output: PathBuf,
    pub elapsed: Duration,
}

/// One audit run: input file in, CSV file out.
pub struct App {
    config: AuditConfig,
    cancel: CancellationToken,
}

impl App {
    pub fn new(config: AuditConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops dispatching new domains when cancelled.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Reads the domain list, audits it and writes the CSV.
    ///
    /// Only an unreadable input, an unwritable output or a failing CSV write
    /// return an error. The output file is created before the first domain is
    /// touched.
    pub async fn run(&self) -> Result<RunSummary> {
        let started = Instant::now();
        let domains = read_domains(&self.config.input).await?;
        let output = File::create(&self.config.output)
            .await
            .map_err(|source| AuditError::OutputUnwritable {
                path: self.config.output.clone(),
                source,
            })?
            .into_std()
            .await;

        let total_domains = domains.len();
        eprintln!(
            "Starting analysis of {total_domains} domains using {} parallel workers...",
            self.config.workers
        );
        info!(total_domains, workers = self.config.workers, "Batch started.");

        let resolver_settings = &self.config.resolver;
        let http_settings = &self.config.http;
        let outcome = run_batch(
            domains,
            self.config.workers,
            || {
                let fetcher = ReqwestFetcher::new(http_settings).map_err(|e| format!("HTTP client error: {e}"))?;
                Ok(DomainAuditor::new(
                    ResolverClient::new(resolver_settings),
                    fetcher,
                    http_settings.max_redirects,
                ))
            },
            &self.cancel,
        )
        .await;

        let rows_written = write_csv(BufWriter::new(output), &outcome.records)?;
        info!(rows_written, interrupted = outcome.interrupted(), "Results exported.");

        Ok(RunSummary {
            total_domains,
            rows_written,
            interrupted: outcome.interrupted(),
            output: self.config.output.clone(),
            elapsed: started.elapsed(),
        })
    }
}

/// One domain per line, trimmed; blank lines are skipped.
pub async fn read_domains(path: &Path) -> Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| AuditError::InputUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}
