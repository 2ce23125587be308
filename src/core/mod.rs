// src/core/mod.rs

// Root of the `core` module: the record types, the DNS seam, the per-domain
// probes and the batch scheduler that drives them.

/// Data structures produced by the probes and assembled into a `DomainRecord`.
pub mod models;

/// DNS lookups behind the `DnsLookup` trait, with the system resolver as fallback.
pub mod resolver;

/// One sub-module per probe, plus the per-domain orchestration.
pub mod scanner;

/// Static tables: DKIM selectors, subdomain labels and hosting signatures.
pub mod knowledge_base;

/// Bounded-concurrency execution over a list of domains.
pub mod batch;
