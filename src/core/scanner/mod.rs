// src/core/scanner/mod.rs

// Public interface of the `scanner` module: one sub-module per probe, plus
// the per-domain orchestration that ties them into a `DomainRecord`.
pub mod dns_scanner;
pub mod soa_scanner;
pub mod sri_scanner;
pub mod subdomain_scanner;
pub mod transport_scanner;

use chrono::Utc;
use std::any::Any;
use tracing::{error, info};

use crate::core::models::DomainRecord;
use crate::core::resolver::DnsLookup;
use self::dns_scanner::run_email_auth_scan;
use self::soa_scanner::run_soa_scan;
use self::sri_scanner::run_sri_scan;
use self::subdomain_scanner::run_subdomain_scan;
use self::transport_scanner::{HttpFetch, run_transport_scan};

/// Network clients owned by exactly one domain analysis.
///
/// Nothing here is shared between domains: the batch scheduler builds a new
/// `DomainAuditor` for every task.
pub struct DomainAuditor<R, H> {
    resolver: R,
    fetcher: H,
    max_redirects: usize,
}

impl<R, H> DomainAuditor<R, H>
where
    R: DnsLookup + 'static,
    H: HttpFetch + 'static,
{
    pub fn new(resolver: R, fetcher: H, max_redirects: usize) -> Self {
        Self {
            resolver,
            fetcher,
            max_redirects,
        }
    }

    /// Runs every probe against `domain` and assembles the record.
    ///
    /// The web chain (subdomains, then the HTTP probe, then SRI on the HTML
    /// that same probe captured) runs alongside the email and SOA lookups.
    pub async fn run_full_scan(&self, domain: &str) -> DomainRecord {
        info!(domain, "Starting full domain scan.");

        let web_chain = async {
            let subdomains = run_subdomain_scan(&self.resolver, domain).await;
            let (transport, html) = run_transport_scan(&self.fetcher, domain, self.max_redirects).await;
            let integrity = run_sri_scan(domain, &html);
            (subdomains, transport, integrity)
        };

        let ((subdomains, transport, integrity), soa, email) = tokio::join!(
            web_chain,
            run_soa_scan(&self.resolver, domain),
            run_email_auth_scan(&self.resolver, domain)
        );

        info!(domain, "Full domain scan finished.");
        DomainRecord {
            domain: domain.to_string(),
            timestamp: Utc::now(),
            soa,
            email,
            subdomains,
            transport,
            integrity,
            error: None,
        }
    }

    /// Like [`run_full_scan`](Self::run_full_scan), but on its own task so a
    /// panic anywhere inside becomes a default-shaped failure record.
    pub async fn audit(self, domain: String) -> DomainRecord {
        let name = domain.clone();
        let handle = tokio::spawn(async move { self.run_full_scan(&domain).await });
        match handle.await {
            Ok(record) => record,
            Err(join_error) => {
                let message = if join_error.is_panic() {
                    panic_message(join_error.into_panic())
                } else {
                    join_error.to_string()
                };
                error!(domain = %name, error = %message, "Domain analysis aborted.");
                DomainRecord::failed(&name, message)
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "domain analysis panicked".to_string()
    }
}
