// src/export.rs

//! CSV rendering of finished domain records: one header row, one row per
//! record, columns in a fixed order.

use csv::WriterBuilder;
use serde::Serialize;
use std::io::Write;

use crate::core::models::DomainRecord;

pub const HEADERS: [&str; 29] = [
    "Domain",
    "Timestamp",
    "Parent Domain",
    "SOA Exists",
    "SOA Record",
    "Primary NS",
    "Admin Email",
    "SPF Exists",
    "SPF Record",
    "DKIM Exists",
    "DKIM Records",
    "DMARC Exists",
    "DMARC Record",
    "Discovered Subdomains",
    "CNAME Records",
    "Has Wildcard DNS",
    "Hosting Provider",
    "HTTP Accessible",
    "Redirects to HTTPS",
    "Final URL",
    "Redirect Chain",
    "HTTP Error",
    "SRI Enabled",
    "Total External Resources",
    "Resources With SRI",
    "SRI Coverage %",
    "Missing SRI Count",
    "SRI Algorithms Used",
    "SRI Error",
];

// Field order must match HEADERS.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    domain: &'a str,
    timestamp: String,
    parent_domain: &'a str,
    soa_exists: &'static str,
    soa_record: Option<&'a str>,
    primary_ns: Option<&'a str>,
    admin_email: Option<&'a str>,
    spf_exists: &'static str,
    spf_record: Option<&'a str>,
    dkim_exists: &'static str,
    dkim_records: String,
    dmarc_exists: &'static str,
    dmarc_record: Option<&'a str>,
    subdomains: String,
    cname_records: String,
    has_wildcard_dns: &'static str,
    hosting_provider: Option<&'a str>,
    http_accessible: &'static str,
    redirects_to_https: &'static str,
    final_url: Option<&'a str>,
    redirect_chain: String,
    http_error: Option<&'a str>,
    sri_enabled: &'static str,
    total_external_resources: usize,
    resources_with_sri: usize,
    sri_coverage: String,
    missing_sri_count: usize,
    sri_algorithms: String,
    sri_error: Option<&'a str>,
}

/// Booleans are written the way existing reports spell them.
fn flag(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

impl<'a> From<&'a DomainRecord> for CsvRow<'a> {
    fn from(r: &'a DomainRecord) -> Self {
        let dkim_records = r
            .email
            .dkim
            .records
            .iter()
            .map(|d| format!("{}:{}", d.selector, d.record))
            .collect::<Vec<_>>()
            .join(";");
        let cname_records = r
            .subdomains
            .cname_records
            .iter()
            .map(|(fqdn, target)| format!("{fqdn}:{target}"))
            .collect::<Vec<_>>()
            .join(",");

        Self {
            domain: &r.domain,
            timestamp: r.timestamp.to_rfc3339(),
            parent_domain: &r.soa.parent_domain,
            soa_exists: flag(r.soa.exists),
            soa_record: r.soa.record.as_deref(),
            primary_ns: r.soa.primary_ns.as_deref(),
            admin_email: r.soa.admin_email.as_deref(),
            spf_exists: flag(r.email.spf.exists),
            spf_record: r.email.spf.record.as_deref(),
            dkim_exists: flag(r.email.dkim.exists),
            dkim_records,
            dmarc_exists: flag(r.email.dmarc.exists),
            dmarc_record: r.email.dmarc.record.as_deref(),
            subdomains: r.subdomains.subdomains.iter().cloned().collect::<Vec<_>>().join(","),
            cname_records,
            has_wildcard_dns: flag(r.subdomains.has_wildcard_dns),
            hosting_provider: r.subdomains.hosting_provider.as_deref(),
            http_accessible: flag(r.transport.reachable),
            redirects_to_https: flag(r.transport.redirects_to_https),
            final_url: r.transport.final_url.as_deref(),
            redirect_chain: r.transport.redirect_chain.join(" -> "),
            http_error: r.transport.error.as_deref(),
            sri_enabled: flag(r.integrity.enabled),
            total_external_resources: r.integrity.total_external,
            resources_with_sri: r.integrity.with_integrity,
            sri_coverage: format!("{:.1}", r.integrity.coverage_percentage),
            missing_sri_count: r.integrity.missing,
            sri_algorithms: r.integrity.algorithms.iter().cloned().collect::<Vec<_>>().join(","),
            sri_error: r.integrity.error.as_deref(),
        }
    }
}

/// Writes the header and one row per record; returns the number of rows.
pub fn write_csv<W: Write>(writer: W, records: &[DomainRecord]) -> Result<usize, csv::Error> {
    let mut csv = WriterBuilder::new().has_headers(false).from_writer(writer);
    csv.write_record(HEADERS)?;
    for record in records {
        csv.serialize(CsvRow::from(record))?;
    }
    csv.flush()?;
    Ok(records.len())
}
