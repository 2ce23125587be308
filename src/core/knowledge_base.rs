//! Static, read-only tables that drive the scanners.
//!
//! Everything here is ordered on purpose: lookups walk these slices front to
//! back and stop at the first match, so reordering an entry changes results.

use strum::{Display, EnumIter};

/// DKIM selectors probed for every domain, in probe order.
pub const DKIM_SELECTORS: &[&str] = &["default", "google", "dkim", "k1"];

/// Labels probed under each domain during subdomain discovery.
pub const SUBDOMAIN_LABELS: &[&str] = &[
    "www", "mail", "webmail", "email", "remote", "portal", "owa",
    "vpn", "mta", "mx", "imap", "smtp", "pop", "cp", "cpanel",
    "webdisk", "whm", "ns1", "ns2", "autodiscover", "autoconfig",
    "admin", "cloud", "dev", "ftp", "test", "staging",
];

/// Hosting providers recognisable from CNAME targets.
///
/// The `Display` form is the label written to reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum HostingProvider {
    GoDaddy,
    BlueHost,
    HostGator,
    DreamHost,
    NameCheap,
    #[strum(to_string = "OVH")]
    Ovh,
    #[strum(to_string = "AWS")]
    Aws,
    #[strum(to_string = "Google Cloud")]
    GoogleCloud,
    #[strum(to_string = "Microsoft Azure")]
    MicrosoftAzure,
    Cloudflare,
}

/// Provider fingerprints as (provider, CNAME target substrings).
///
/// Order is the tie-break: the first provider with any matching pattern wins.
pub static HOSTING_SIGNATURES: &[(HostingProvider, &[&str])] = &[
    (HostingProvider::GoDaddy, &[".secureserver.net"]),
    (HostingProvider::BlueHost, &[".bluehost.com"]),
    (HostingProvider::HostGator, &[".hostgator.com"]),
    (HostingProvider::DreamHost, &[".dreamhost.com"]),
    (HostingProvider::NameCheap, &[".registrar-servers.com"]),
    (HostingProvider::Ovh, &[".ovh.net"]),
    (HostingProvider::Aws, &[".amazonaws.com"]),
    (HostingProvider::GoogleCloud, &[".googlehosted.com"]),
    (HostingProvider::MicrosoftAzure, &[".azurewebsites.net"]),
    (HostingProvider::Cloudflare, &[".cloudflare.net"]),
];

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn every_provider_has_a_signature_in_declaration_order() {
        let table: Vec<HostingProvider> = HOSTING_SIGNATURES.iter().map(|(p, _)| *p).collect();
        let declared: Vec<HostingProvider> = HostingProvider::iter().collect();
        assert_eq!(table, declared);
        assert!(HOSTING_SIGNATURES.iter().all(|(_, patterns)| !patterns.is_empty()));
    }

    #[test]
    fn provider_labels() {
        assert_eq!(HostingProvider::Aws.to_string(), "AWS");
        assert_eq!(HostingProvider::MicrosoftAzure.to_string(), "Microsoft Azure");
        assert_eq!(HostingProvider::GoDaddy.to_string(), "GoDaddy");
    }

    #[test]
    fn subdomain_labels_are_unique() {
        let mut labels = SUBDOMAIN_LABELS.to_vec();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), SUBDOMAIN_LABELS.len());
    }
}
