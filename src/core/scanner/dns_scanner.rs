// src/core/scanner/dns_scanner.rs

use tracing::{debug, info};

use crate::core::knowledge_base::DKIM_SELECTORS;
use crate::core::models::{DkimFinding, DkimRecord, DmarcFinding, DnsAnswer, EmailAuthFindings, SpfFinding};
use crate::core::resolver::DnsLookup;
use hickory_resolver::proto::rr::RecordType;

/// SPF policies start with this prefix in presentation form (quote included).
pub const SPF_PREFIX: &str = "\"v=spf1";

/// Runs the SPF, DKIM and DMARC lookups for a domain.
///
/// The three lookups run concurrently on the caller's resolver. Resolver
/// errors are treated as "not published": this function never fails.
pub async fn run_email_auth_scan<R: DnsLookup>(resolver: &R, domain: &str) -> EmailAuthFindings {
    info!(domain, "Starting email authentication scan.");

    let (spf, dkim, dmarc) = tokio::join!(
        lookup_spf(resolver, domain),
        lookup_dkim(resolver, domain, DKIM_SELECTORS),
        lookup_dmarc(resolver, domain)
    );

    info!(
        spf = spf.exists,
        dkim = dkim.records.len(),
        dmarc = dmarc.exists,
        "Email authentication scan finished."
    );
    EmailAuthFindings { spf, dkim, dmarc }
}

/// Looks up the SPF policy among the domain's own TXT records.
async fn lookup_spf<R: DnsLookup>(resolver: &R, domain: &str) -> SpfFinding {
    debug!(domain, "Looking up SPF record.");
    let answer = resolver.query(domain, RecordType::TXT).await;
    let Some(values) = found_or_log(&answer, domain, "SPF") else {
        return SpfFinding::default();
    };

    let spf_records: Vec<&String> = values.iter().filter(|v| v.starts_with(SPF_PREFIX)).collect();
    match spf_records.first() {
        Some(first) => {
            if spf_records.len() > 1 {
                debug!(domain, count = spf_records.len(), "Multiple SPF records published.");
            }
            SpfFinding {
                exists: true,
                record: Some((*first).clone()),
                multiple_records: spf_records.len() > 1,
            }
        }
        None => {
            debug!(domain, "No SPF record among TXT records.");
            SpfFinding::default()
        }
    }
}

/// Probes every selector in order at `selector._domainkey.domain`.
/// The first TXT value of each selector that answers is kept.
async fn lookup_dkim<R: DnsLookup>(resolver: &R, domain: &str, selectors: &[&str]) -> DkimFinding {
    let mut records = Vec::new();
    for selector in selectors {
        let dkim_target = format!("{selector}._domainkey.{domain}");
        debug!(selector, "Checking for DKIM record.");

        let answer = resolver.query(&dkim_target, RecordType::TXT).await;
        if let Some(record) = found_or_log(&answer, &dkim_target, "DKIM").and_then(|v| v.first()) {
            records.push(DkimRecord {
                selector: selector.to_string(),
                record: record.clone(),
            });
        }
    }

    DkimFinding {
        exists: !records.is_empty(),
        records,
    }
}

/// Looks up the DMARC policy at `_dmarc.domain`; the first value wins.
async fn lookup_dmarc<R: DnsLookup>(resolver: &R, domain: &str) -> DmarcFinding {
    let dmarc_target = format!("_dmarc.{domain}");
    debug!(target = %dmarc_target, "Looking up DMARC record.");
    let answer = resolver.query(&dmarc_target, RecordType::TXT).await;

    match found_or_log(&answer, &dmarc_target, "DMARC").and_then(|v| v.first()) {
        Some(record) => DmarcFinding {
            exists: true,
            record: Some(record.clone()),
        },
        None => DmarcFinding::default(),
    }
}

fn found_or_log<'a>(answer: &'a DnsAnswer, name: &str, mechanism: &str) -> Option<&'a [String]> {
    if let DnsAnswer::Error(e) = answer {
        debug!(name, mechanism, error = %e, "Lookup failed, treating as not published.");
    }
    answer.values()
}
