// src/core/scanner/soa_scanner.rs

use hickory_resolver::proto::rr::RecordType;
use tracing::{debug, info, warn};

use crate::core::models::{DnsAnswer, SoaFinding};
use crate::core::resolver::DnsLookup;

/// Last two labels of `domain`: `www.shop.example.com` gives `example.com`.
///
/// Multi-label public suffixes are not special-cased, so `example.co.uk`
/// gives `co.uk`. Existing reports depend on this.
pub fn parent_domain(domain: &str) -> String {
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() <= 2 {
        return domain.to_string();
    }
    labels[labels.len() - 2..].join(".")
}

/// Fetches the SOA record of the domain's parent zone.
pub async fn run_soa_scan<R: DnsLookup>(resolver: &R, domain: &str) -> SoaFinding {
    let parent = parent_domain(domain);
    info!(domain, parent = %parent, "Starting SOA scan.");

    match resolver.query(&parent, RecordType::SOA).await {
        DnsAnswer::Found(values) => {
            let raw = values.first().cloned().unwrap_or_default();
            let fields: Vec<&str> = raw.split_whitespace().collect();
            if fields.len() >= 2 {
                debug!(primary_ns = fields[0], admin = fields[1], "SOA record found.");
                SoaFinding {
                    exists: true,
                    parent_domain: parent,
                    record: Some(format!("{} {}", fields[0], fields[1])),
                    primary_ns: Some(fields[0].to_string()),
                    admin_email: Some(fields[1].to_string()),
                    error: None,
                }
            } else {
                debug!(record = %raw, "SOA record has fewer than two fields.");
                SoaFinding {
                    exists: true,
                    parent_domain: parent,
                    record: Some(raw),
                    ..Default::default()
                }
            }
        }
        DnsAnswer::NotFound => {
            debug!(parent = %parent, "No SOA record.");
            SoaFinding {
                parent_domain: parent,
                ..Default::default()
            }
        }
        DnsAnswer::Error(e) => {
            warn!(parent = %parent, error = %e, "SOA lookup failed.");
            SoaFinding {
                parent_domain: parent,
                error: Some(e),
                ..Default::default()
            }
        }
    }
}
