// src/core/scanner/sri_scanner.rs

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};
use url::Url;

use crate::core::models::IntegrityReport;

/// Hash algorithms browsers accept for SRI, captured from the attribute prefix.
static RE_SRI_ALGORITHM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(sha256|sha384|sha512)-").expect("SRI algorithm pattern is valid"));

/// An external script or stylesheet reference.
#[derive(Debug, Clone, PartialEq)]
struct ExternalResource {
    url: String,
    integrity: Option<String>,
}

/// Measures Subresource Integrity coverage of the externally hosted scripts
/// and stylesheets referenced by `html`.
///
/// An empty document is reported through the `error` field; so is a failure
/// to build the element selectors.
pub fn run_sri_scan(domain: &str, html: &str) -> IntegrityReport {
    info!(domain, bytes = html.len(), "Starting SRI scan.");
    if html.is_empty() {
        debug!(domain, "No HTML captured, nothing to analyse.");
        return IntegrityReport::failed("No HTML content available");
    }

    let resources = match collect_external_resources(domain, html) {
        Ok(resources) => resources,
        Err(e) => {
            warn!(domain, error = %e, "SRI parsing failed.");
            return IntegrityReport::failed(format!("SRI parsing error: {e}"));
        }
    };

    let report = summarize(&resources);
    info!(
        total = report.total_external,
        with_sri = report.with_integrity,
        coverage = report.coverage_percentage,
        "SRI scan finished."
    );
    report
}

fn collect_external_resources(domain: &str, html: &str) -> Result<Vec<ExternalResource>, String> {
    let scripts = Selector::parse("script[src]").map_err(|e| e.to_string())?;
    let links = Selector::parse("link[href][rel]").map_err(|e| e.to_string())?;
    let document = Html::parse_document(html);

    let script_refs = document.select(&scripts).filter_map(|el| reference(el, "src"));
    let stylesheet_refs = document
        .select(&links)
        .filter(|el| is_stylesheet(el))
        .filter_map(|el| reference(el, "href"));

    Ok(script_refs
        .chain(stylesheet_refs)
        .filter(|resource| is_external(&resource.url, domain))
        .collect())
}

fn reference(element: ElementRef<'_>, attr: &str) -> Option<ExternalResource> {
    let value = element.value();
    Some(ExternalResource {
        url: value.attr(attr)?.to_string(),
        integrity: value
            .attr("integrity")
            .map(str::trim)
            .filter(|i| !i.is_empty())
            .map(String::from),
    })
}

fn is_stylesheet(element: &ElementRef<'_>) -> bool {
    element
        .value()
        .attr("rel")
        .is_some_and(|rel| rel.split_ascii_whitespace().any(|t| t.eq_ignore_ascii_case("stylesheet")))
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Absolute http(s) URL whose host, ignoring a leading `www.`, is not the
/// audited domain. Relative and protocol-relative references are local.
fn is_external(reference: &str, domain: &str) -> bool {
    let reference = reference.trim();
    let lower = reference.to_ascii_lowercase();
    if !lower.starts_with("http://") && !lower.starts_with("https://") {
        return false;
    }
    let Ok(url) = Url::parse(reference) else {
        return false;
    };
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let authority = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    };
    strip_www(&authority) != strip_www(&domain.to_ascii_lowercase())
}

/// `sha256`, `sha384` or `sha512` from the attribute prefix, otherwise `unknown`.
fn hash_algorithm(integrity: &str) -> &str {
    RE_SRI_ALGORITHM
        .captures(integrity)
        .and_then(|caps| caps.get(1))
        .map_or("unknown", |m| m.as_str())
}

/// Rounds half to even on the exact binary value, so 6.25 becomes 6.2.
///
/// `f64::round` would push every tie away from zero; float formatting rounds
/// the exact expansion instead, matching reports produced before.
fn round_to_tenth(value: f64) -> f64 {
    format!("{value:.1}").parse().unwrap_or(value)
}

fn summarize(resources: &[ExternalResource]) -> IntegrityReport {
    let total_external = resources.len();
    let algorithms: BTreeSet<String> = resources
        .iter()
        .filter_map(|r| r.integrity.as_deref())
        .map(|i| hash_algorithm(i).to_string())
        .collect();
    let with_integrity = resources.iter().filter(|r| r.integrity.is_some()).count();

    let coverage_percentage = if total_external == 0 {
        0.0
    } else {
        round_to_tenth(with_integrity as f64 * 100.0 / total_external as f64)
    };

    IntegrityReport {
        enabled: with_integrity > 0,
        total_external,
        with_integrity,
        coverage_percentage,
        missing: total_external - with_integrity,
        algorithms,
        error: None,
    }
}
