// src/core/scanner/transport_scanner.rs

use std::future::Future;

use reqwest::header::{HeaderName, CONTENT_TYPE, LOCATION};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::HttpSettings;
use crate::core::models::TransportProbeResult;

/// One HTTP exchange, without any redirect handling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HopResponse {
    pub status: u16,
    pub location: Option<String>,
    pub content_type: Option<String>,
    /// Captured only for HTML responses that are not redirects.
    pub body: Option<String>,
}

impl HopResponse {
    /// Where this response sends the client next, if it is a usable redirect.
    fn redirect_target(&self, current: &Url) -> Option<Url> {
        if !matches!(self.status, 301 | 302 | 303 | 307 | 308) {
            return None;
        }
        let location = self.location.as_deref()?;
        Url::parse(location).or_else(|_| current.join(location)).ok()
    }
}

/// Single-hop GET. Implementations must not follow redirects themselves.
pub trait HttpFetch: Send + Sync {
    fn get(&self, url: &Url) -> impl Future<Output = Result<HopResponse, String>> + Send;
}

/// `reqwest`-backed fetcher with automatic redirects disabled.
pub struct ReqwestFetcher {
    client: reqwest::Client,
    body_cap: usize,
}

impl ReqwestFetcher {
    pub fn new(settings: &HttpSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::none())
            .timeout(settings.timeout)
            .build()?;
        Ok(Self {
            client,
            body_cap: settings.body_cap,
        })
    }
}

impl HttpFetch for ReqwestFetcher {
    async fn get(&self, url: &Url) -> Result<HopResponse, String> {
        let mut response = self.client.get(url.clone()).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "HTTP request failed.");
            describe(&e)
        })?;

        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        };
        let location = header(LOCATION);
        let content_type = header(CONTENT_TYPE);
        let status = response.status().as_u16();
        debug!(url = %url, status, "Received HTTP response.");

        let is_html = content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("text/html"));
        let body = if response.status().is_redirection() && location.is_some() {
            None
        } else if is_html {
            Some(read_capped(&mut response, self.body_cap).await?)
        } else {
            None
        };

        Ok(HopResponse {
            status,
            location,
            content_type,
            body,
        })
    }
}

/// Reads at most `cap` bytes of the body; anything beyond is dropped unread.
async fn read_capped(response: &mut reqwest::Response, cap: usize) -> Result<String, String> {
    let mut buffer: Vec<u8> = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(|e| describe(&e))? {
        let room = cap.saturating_sub(buffer.len());
        buffer.extend_from_slice(&chunk[..chunk.len().min(room)]);
        if buffer.len() >= cap {
            debug!(cap, "HTML body truncated.");
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// reqwest's top-level message hides the interesting part (DNS, TLS, refused) in its sources.
fn describe(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = std::error::Error::source(cause);
    }
    message
}

/// Requests `http://{domain}` and follows redirects up to `max_redirects`.
///
/// # Returns
/// The probe result plus the captured HTML of the final response (empty when
/// the site was unreachable or did not serve HTML).
pub async fn run_transport_scan<H: HttpFetch>(
    fetcher: &H,
    domain: &str,
    max_redirects: usize,
) -> (TransportProbeResult, String) {
    info!(domain, "Starting transport scan.");

    let mut current = match Url::parse(&format!("http://{domain}")) {
        Ok(url) => url,
        Err(e) => {
            error!(domain, error = %e, "Domain does not form a valid URL.");
            return (TransportProbeResult::unreachable(format!("Invalid URL: {e}")), String::new());
        }
    };
    let mut visited: Vec<String> = Vec::new();

    loop {
        let hop = match fetcher.get(&current).await {
            Ok(hop) => hop,
            Err(e) => return (TransportProbeResult::unreachable(e), String::new()),
        };

        let Some(next) = hop.redirect_target(&current) else {
            let final_url = current.to_string();
            let redirect_chain = if visited.is_empty() {
                Vec::new()
            } else {
                visited.push(final_url.clone());
                visited
            };
            let result = TransportProbeResult {
                reachable: true,
                redirects_to_https: current.scheme() == "https",
                final_url: Some(final_url),
                redirect_chain,
                error: None,
            };
            info!(
                final_url = ?result.final_url,
                https = result.redirects_to_https,
                hops = result.redirect_chain.len(),
                "Transport scan finished."
            );
            return (result, hop.body.unwrap_or_default());
        };

        if visited.len() >= max_redirects {
            warn!(domain, max_redirects, "Redirect limit exceeded.");
            return (
                TransportProbeResult::unreachable(format!("Exceeded {max_redirects} redirects.")),
                String::new(),
            );
        }
        debug!(from = %current, to = %next, "Following redirect.");
        visited.push(current.to_string());
        current = next;
    }
}
