// src/core/batch.rs

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::models::DomainRecord;
use crate::core::resolver::DnsLookup;
use crate::core::scanner::DomainAuditor;
use crate::core::scanner::transport_scanner::HttpFetch;

/// Completion counter shared by every in-flight domain.
#[derive(Debug)]
pub struct Progress {
    completed: AtomicUsize,
    total: usize,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            total,
        }
    }

    /// Counts one finished domain and prints the progress line to stderr.
    pub fn advance(&self, domain: &str) -> usize {
        let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        info!(domain, done, total = self.total, "Domain completed.");
        eprintln!("{}", progress_line(done, self.total));
        done
    }
}

pub fn progress_line(done: usize, total: usize) -> String {
    let percentage = if total == 0 {
        100.0
    } else {
        done as f64 * 100.0 / total as f64
    };
    format!("Progress: {done}/{total} domains analyzed ({percentage:.1}%)")
}

/// What a batch produced. Records are in completion order.
#[derive(Debug)]
pub struct BatchOutcome {
    pub records: Vec<DomainRecord>,
    /// Domains never dispatched because the run was cancelled.
    pub skipped: usize,
}

impl BatchOutcome {
    pub fn interrupted(&self) -> bool {
        self.skipped > 0
    }
}

/// Audits every domain with at most `workers` analyses in flight.
///
/// `make_auditor` is called once per domain so each analysis owns its own
/// resolver and HTTP client. A factory error or a failing analysis becomes
/// that domain's failure record; the batch itself never fails.
///
/// Once `cancel` fires no new domain is started, the in-flight ones run to
/// completion, and their records are returned with the rest.
pub async fn run_batch<R, H, F>(
    domains: Vec<String>,
    workers: usize,
    make_auditor: F,
    cancel: &CancellationToken,
) -> BatchOutcome
where
    R: DnsLookup + 'static,
    H: HttpFetch + 'static,
    F: Fn() -> Result<DomainAuditor<R, H>, String>,
{
    let workers = workers.max(1);
    let progress = Arc::new(Progress::new(domains.len()));
    let mut pending = domains.into_iter();
    let mut in_flight = FuturesUnordered::new();
    let mut records = Vec::with_capacity(pending.len());

    loop {
        while in_flight.len() < workers && !cancel.is_cancelled() {
            let Some(domain) = pending.next() else { break };
            in_flight.push(analyze_one(domain, make_auditor(), Arc::clone(&progress)));
        }

        match in_flight.next().await {
            Some(record) => records.push(record),
            None => break,
        }
    }

    let skipped = pending.len();
    if skipped > 0 {
        warn!(skipped, completed = records.len(), "Batch cancelled before all domains were started.");
    }
    BatchOutcome { records, skipped }
}

async fn analyze_one<R, H>(
    domain: String,
    auditor: Result<DomainAuditor<R, H>, String>,
    progress: Arc<Progress>,
) -> DomainRecord
where
    R: DnsLookup + 'static,
    H: HttpFetch + 'static,
{
    let record = match auditor {
        Ok(auditor) => auditor.audit(domain).await,
        Err(e) => {
            warn!(domain = %domain, error = %e, "Could not set up network clients.");
            DomainRecord::failed(&domain, e)
        }
    };
    progress.advance(&record.domain);
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resolver::testing::StaticResolver;
    use crate::core::scanner::transport_scanner::testing::ScriptedFetcher;
    use hickory_resolver::proto::rr::RecordType;
    use std::collections::BTreeMap;

    fn domains(names: &[&str]) -> Vec<String> {
        names.iter().map(|d| d.to_string()).collect()
    }

    fn shared_world() -> (StaticResolver, ScriptedFetcher) {
        let resolver = StaticResolver::new()
            .with("alpha.test", RecordType::TXT, &["\"v=spf1 -all\""])
            .with("_dmarc.beta.test", RecordType::TXT, &["\"v=DMARC1; p=none\""])
            .with("www.gamma.test", RecordType::CNAME, &["gamma.herokudns.example."])
            .with("mail.delta.test", RecordType::A, &["192.0.2.4"])
            .with_wildcard("epsilon.test");
        let fetcher = ScriptedFetcher::new()
            .redirect("http://alpha.test/", 301, "https://alpha.test/")
            .html("https://alpha.test/", r#"<script src="https://cdn.example/x.js"></script>"#)
            .html("http://beta.test/", "<p>plain</p>");
        (resolver, fetcher)
    }

    /// Record fields minus the timestamp, keyed by domain.
    fn by_domain(records: &[DomainRecord]) -> BTreeMap<String, DomainRecord> {
        records
            .iter()
            .cloned()
            .map(|mut r| {
                r.timestamp = chrono::DateTime::<chrono::Utc>::UNIX_EPOCH;
                (r.domain.clone(), r)
            })
            .collect()
    }

    #[tokio::test]
    async fn one_panicking_domain_still_yields_every_row() {
        let (resolver, fetcher) = shared_world();
        let resolver = resolver.panicking_for("broken.test");
        let input = domains(&["alpha.test", "broken.test", "beta.test", "gamma.test"]);

        let outcome = run_batch(
            input,
            3,
            || Ok(DomainAuditor::new(resolver.clone(), fetcher.clone(), 10)),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.records.len(), 4);
        assert!(!outcome.interrupted());
        let rows = by_domain(&outcome.records);
        let broken = &rows["broken.test"];
        assert!(broken.error.is_some());
        assert!(!broken.email.spf.exists);
        assert!(broken.subdomains.subdomains.is_empty());
        assert!(rows["alpha.test"].email.spf.exists);
        assert_eq!(rows["alpha.test"].error, None);
    }

    #[tokio::test]
    async fn worker_count_does_not_change_results() {
        let (resolver, fetcher) = shared_world();
        let input = domains(&["alpha.test", "beta.test", "gamma.test", "delta.test", "epsilon.test"]);
        let factory = || Ok(DomainAuditor::new(resolver.clone(), fetcher.clone(), 10));

        let serial = run_batch(input.clone(), 1, factory, &CancellationToken::new()).await;
        let parallel = run_batch(input, 4, factory, &CancellationToken::new()).await;

        assert_eq!(serial.records.len(), 5);
        assert_eq!(by_domain(&serial.records), by_domain(&parallel.records));
        assert!(by_domain(&parallel.records)["epsilon.test"].subdomains.has_wildcard_dns);
    }

    #[tokio::test]
    async fn factory_errors_become_failure_rows() {
        let outcome = run_batch::<StaticResolver, ScriptedFetcher, _>(
            domains(&["alpha.test", "beta.test"]),
            2,
            || Err("TLS backend unavailable".to_string()),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.records.len(), 2);
        assert!(
            outcome
                .records
                .iter()
                .all(|r| r.error.as_deref() == Some("TLS backend unavailable"))
        );
    }

    #[tokio::test]
    async fn cancelled_batch_starts_nothing_new() {
        let (resolver, fetcher) = shared_world();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = run_batch(
            domains(&["alpha.test", "beta.test", "gamma.test"]),
            2,
            || Ok(DomainAuditor::new(resolver.clone(), fetcher.clone(), 10)),
            &cancel,
        )
        .await;

        assert!(outcome.records.is_empty());
        assert_eq!(outcome.skipped, 3);
        assert!(outcome.interrupted());
    }

    #[tokio::test]
    async fn empty_input_is_an_empty_batch() {
        let outcome = run_batch::<StaticResolver, ScriptedFetcher, _>(
            Vec::new(),
            4,
            || Err("never called".to_string()),
            &CancellationToken::new(),
        )
        .await;
        assert!(outcome.records.is_empty());
        assert!(!outcome.interrupted());
    }

    #[test]
    fn progress_counts_and_formats() {
        let progress = Progress::new(4);
        assert_eq!(progress.advance("a.test"), 1);
        assert_eq!(progress.advance("b.test"), 2);
        assert_eq!(progress_line(1, 3), "Progress: 1/3 domains analyzed (33.3%)");
        assert_eq!(progress_line(4, 4), "Progress: 4/4 domains analyzed (100.0%)");
    }
}
