// src/core/scanner/subdomain_scanner.rs

use chrono::Utc;
use futures::stream::{self, StreamExt};
use hickory_resolver::proto::rr::RecordType;
use tracing::{debug, info, warn};

use crate::core::knowledge_base::{HostingProvider, HOSTING_SIGNATURES, SUBDOMAIN_LABELS};
use crate::core::models::{DnsAnswer, SubdomainSurvey};
use crate::core::resolver::DnsLookup;

/// Labels probed at the same time within one domain.
const LABEL_CONCURRENCY: usize = 8;

/// What one candidate label resolved to.
struct LabelProbe {
    fqdn: String,
    a: DnsAnswer,
    cname: DnsAnswer,
}

/// Sweeps the common subdomain labels, checks for wildcard DNS and
/// fingerprints the hosting provider from the CNAME targets found.
pub async fn run_subdomain_scan<R: DnsLookup>(resolver: &R, domain: &str) -> SubdomainSurvey {
    info!(domain, labels = SUBDOMAIN_LABELS.len(), "Starting subdomain scan.");

    // Futures are built up front so no closure is held across the await.
    let pending: Vec<_> = SUBDOMAIN_LABELS
        .iter()
        .map(|label| probe_label(resolver, label, domain))
        .collect();
    let probes: Vec<LabelProbe> = stream::iter(pending)
        .buffered(LABEL_CONCURRENCY)
        .collect()
        .await;

    let mut survey = SubdomainSurvey::default();
    for probe in probes {
        absorb_probe(&mut survey, probe);
    }

    survey.has_wildcard_dns = detect_wildcard(resolver, domain).await;
    survey.hosting_provider = fingerprint_provider(survey.cname_records.values().map(String::as_str))
        .map(|provider| provider.to_string());

    info!(
        found = survey.subdomains.len(),
        wildcard = survey.has_wildcard_dns,
        provider = ?survey.hosting_provider,
        "Subdomain scan finished."
    );
    survey
}

async fn probe_label<R: DnsLookup>(resolver: &R, label: &str, domain: &str) -> LabelProbe {
    let fqdn = format!("{label}.{domain}");
    let (a, cname) = tokio::join!(
        resolver.query(&fqdn, RecordType::A),
        resolver.query(&fqdn, RecordType::CNAME)
    );
    LabelProbe { fqdn, a, cname }
}

/// Folds one label's answers into the survey. A failed lookup is logged and
/// skipped; it never affects the other labels.
fn absorb_probe(survey: &mut SubdomainSurvey, probe: LabelProbe) {
    for (record_type, answer) in [("A", &probe.a), ("CNAME", &probe.cname)] {
        if let DnsAnswer::Error(e) = answer {
            warn!(fqdn = %probe.fqdn, record_type, error = %e, "Subdomain probe failed, skipping.");
        }
    }

    if probe.a.is_found() {
        debug!(fqdn = %probe.fqdn, "Subdomain has an A record.");
        survey.subdomains.insert(probe.fqdn.clone());
    }
    if let Some(target) = probe.cname.first() {
        debug!(fqdn = %probe.fqdn, target, "Subdomain has a CNAME record.");
        survey.record_cname(&probe.fqdn, target);
    }
}

/// Label that no real zone would define on purpose.
fn synthetic_label() -> String {
    format!(
        "wildcard-test-{}-{:08x}",
        Utc::now().format("%Y%m%d%H%M%S"),
        rand::random::<u32>()
    )
}

/// A synthetic label that resolves means a `*` record answers for the zone.
/// The discovered set is reported as-is either way.
async fn detect_wildcard<R: DnsLookup>(resolver: &R, domain: &str) -> bool {
    let probe = format!("{}.{domain}", synthetic_label());
    let resolved = resolver.query(&probe, RecordType::A).await.is_found();
    if resolved {
        debug!(probe = %probe, "Synthetic label resolved: wildcard DNS in place.");
    }
    resolved
}

/// Returns the first provider, in table order, with a pattern contained in
/// any of the targets.
pub fn fingerprint_provider<'a>(targets: impl Iterator<Item = &'a str> + Clone) -> Option<HostingProvider> {
    HOSTING_SIGNATURES.iter().find_map(|(provider, patterns)| {
        patterns
            .iter()
            .any(|pattern| targets.clone().any(|target| target.contains(pattern)))
            .then_some(*provider)
    })
}
