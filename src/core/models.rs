// src/core/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// --- DNS Query Outcome ---

/// Outcome of a single resolver query.
///
/// `Found` always carries at least one value. "Domain does not exist" and
/// "no records of this type" both collapse into `NotFound`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DnsAnswer {
    Found(Vec<String>),
    NotFound,
    Error(String),
}

impl DnsAnswer {
    /// Builds an answer from raw values, mapping an empty set to `NotFound`.
    pub fn from_values(values: Vec<String>) -> Self {
        if values.is_empty() {
            DnsAnswer::NotFound
        } else {
            DnsAnswer::Found(values)
        }
    }

    /// The resolved values, or `None` for both negative and error outcomes.
    pub fn values(&self) -> Option<&[String]> {
        match self {
            DnsAnswer::Found(values) => Some(values),
            _ => None,
        }
    }

    pub fn first(&self) -> Option<&str> {
        self.values().and_then(|v| v.first()).map(String::as_str)
    }

    pub fn is_found(&self) -> bool {
        matches!(self, DnsAnswer::Found(_))
    }
}

// --- Email Authentication Models ---

// SPF lookup result. `multiple_records` flags more than one `v=spf1` TXT value,
// which receivers treat as a permanent error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpfFinding {
    pub exists: bool,
    pub record: Option<String>,
    pub multiple_records: bool,
}

// A DKIM key published under one selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DkimRecord {
    pub selector: String,
    pub record: String,
}

// DKIM results in selector probe order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DkimFinding {
    pub exists: bool,
    pub records: Vec<DkimRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DmarcFinding {
    pub exists: bool,
    pub record: Option<String>,
}

/// The three email-authentication findings gathered for one domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailAuthFindings {
    pub spf: SpfFinding,
    pub dkim: DkimFinding,
    pub dmarc: DmarcFinding,
}

// --- Delegation Models ---

/// SOA of the parent domain. Only the primary nameserver and the
/// administrative contact are kept from the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SoaFinding {
    pub exists: bool,
    pub parent_domain: String,
    pub record: Option<String>,
    pub primary_ns: Option<String>,
    pub admin_email: Option<String>,
    pub error: Option<String>,
}

// --- Subdomain Models ---

/// Result of the subdomain sweep.
///
/// Every key of `cname_records` is also a member of `subdomains`; use
/// [`SubdomainSurvey::record_cname`] to keep that true.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubdomainSurvey {
    pub subdomains: BTreeSet<String>,
    pub cname_records: BTreeMap<String, String>,
    pub has_wildcard_dns: bool,
    pub hosting_provider: Option<String>,
}

impl SubdomainSurvey {
    pub fn record_cname(&mut self, fqdn: &str, target: &str) {
        self.subdomains.insert(fqdn.to_string());
        self.cname_records.insert(fqdn.to_string(), target.to_string());
    }
}

// --- Transport Models ---

/// Outcome of the plaintext HTTP probe.
///
/// When `reachable` is false, `final_url` is `None` and `redirect_chain` is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportProbeResult {
    pub reachable: bool,
    pub redirects_to_https: bool,
    pub final_url: Option<String>,
    pub redirect_chain: Vec<String>,
    pub error: Option<String>,
}

impl TransportProbeResult {
    pub fn unreachable(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

// --- Subresource Integrity Models ---

/// SRI coverage over externally hosted scripts and stylesheets.
///
/// `with_integrity + missing == total` and `enabled == (with_integrity > 0)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub enabled: bool,
    pub total_external: usize,
    pub with_integrity: usize,
    pub coverage_percentage: f64,
    pub missing: usize,
    pub algorithms: BTreeSet<String>,
    pub error: Option<String>,
}

impl IntegrityReport {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

// --- Main Record ---

/// Everything learned about one domain in one run.
///
/// Every nested field is always present; failure cases fill them with their
/// empty shape instead of leaving them out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub domain: String,
    pub timestamp: DateTime<Utc>,
    pub soa: SoaFinding,
    pub email: EmailAuthFindings,
    pub subdomains: SubdomainSurvey,
    pub transport: TransportProbeResult,
    pub integrity: IntegrityReport,
    pub error: Option<String>,
}

impl DomainRecord {
    /// The canonical empty record. Every failure site starts from here.
    pub fn empty(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            timestamp: Utc::now(),
            soa: SoaFinding {
                parent_domain: domain.to_string(),
                ..Default::default()
            },
            email: EmailAuthFindings::default(),
            subdomains: SubdomainSurvey::default(),
            transport: TransportProbeResult::default(),
            integrity: IntegrityReport::default(),
            error: None,
        }
    }

    /// A record for a domain whose analysis blew up before producing anything.
    pub fn failed(domain: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut record = Self::empty(domain);
        record.transport.error = Some(message.clone());
        record.integrity.error = Some("Domain analysis failed".to_string());
        record.error = Some(message);
        record
    }
}
