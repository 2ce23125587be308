// src/core/resolver.rs

use std::future::Future;

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::lookup::Lookup;
use hickory_resolver::proto::error::ProtoErrorKind;
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::proto::rr::{RData, Record, RecordType};
use hickory_resolver::TokioAsyncResolver;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::config::ResolverSettings;
use crate::core::models::DnsAnswer;

/// Anything that can answer typed DNS queries.
///
/// Implementations never fail: every outcome is folded into a [`DnsAnswer`].
pub trait DnsLookup: Send + Sync {
    fn query(&self, name: &str, record_type: RecordType) -> impl Future<Output = DnsAnswer> + Send;
}

/// How a failed lookup should be reported.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Failure {
    NotFound,
    Timeout,
    Error(String),
}

/// DNS client owned by a single domain task.
///
/// Queries go to the pre-configured upstream first. A timeout triggers one
/// retry through the operating system's resolver configuration with a
/// shorter budget; whatever that retry produces, failures included, is final.
pub struct ResolverClient {
    primary: TokioAsyncResolver,
    fallback: OnceCell<Option<TokioAsyncResolver>>,
    settings: ResolverSettings,
}

impl ResolverClient {
    pub fn new(settings: &ResolverSettings) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = settings.primary_timeout;
        opts.attempts = 1;
        opts.ndots = 0;

        Self {
            primary: TokioAsyncResolver::tokio(ResolverConfig::default(), opts),
            fallback: OnceCell::new(),
            settings: settings.clone(),
        }
    }

    async fn system_resolver(&self) -> Option<&TokioAsyncResolver> {
        self.fallback
            .get_or_init(|| async {
                match hickory_resolver::system_conf::read_system_conf() {
                    Ok((config, mut opts)) => {
                        opts.timeout = self.settings.fallback_timeout;
                        opts.attempts = 1;
                        opts.ndots = 0;
                        Some(TokioAsyncResolver::tokio(config, opts))
                    }
                    Err(e) => {
                        warn!(error = %e, "System resolver configuration unavailable; no DNS fallback.");
                        None
                    }
                }
            })
            .await
            .as_ref()
    }

    async fn lookup_with(
        &self,
        resolver: &TokioAsyncResolver,
        name: &str,
        record_type: RecordType,
        budget: std::time::Duration,
    ) -> Result<Vec<String>, Failure> {
        match tokio::time::timeout(budget, resolver.lookup(absolute(name), record_type)).await {
            Ok(Ok(lookup)) => Ok(answers_of_type(&lookup, record_type)),
            Ok(Err(e)) => Err(classify(&e, self.settings.servfail_as_not_found)),
            Err(_) => Err(Failure::Timeout),
        }
    }
}

impl DnsLookup for ResolverClient {
    async fn query(&self, name: &str, record_type: RecordType) -> DnsAnswer {
        let primary = self
            .lookup_with(&self.primary, name, record_type, self.settings.primary_timeout)
            .await;

        settle(name, record_type, primary, || async move {
            let Some(system) = self.system_resolver().await else {
                return None;
            };
            Some(
                self.lookup_with(system, name, record_type, self.settings.fallback_timeout)
                    .await,
            )
        })
        .await
    }
}

/// Turns the primary outcome into an answer, consulting `fallback` only
/// after a timeout. `fallback` yields `None` when no system resolver exists.
async fn settle<F, Fut>(
    name: &str,
    record_type: RecordType,
    primary: Result<Vec<String>, Failure>,
    fallback: F,
) -> DnsAnswer
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Option<Result<Vec<String>, Failure>>>,
{
    match primary {
        Ok(values) => DnsAnswer::from_values(values),
        Err(Failure::NotFound) => DnsAnswer::NotFound,
        Err(Failure::Error(message)) => {
            warn!(name, %record_type, error = %message, "DNS query failed.");
            DnsAnswer::Error(message)
        }
        Err(Failure::Timeout) => {
            debug!(name, %record_type, "Primary resolver timed out, retrying with system resolver.");
            match fallback().await {
                Some(Ok(values)) => DnsAnswer::from_values(values),
                Some(Err(failure)) => {
                    debug!(name, %record_type, ?failure, "Fallback lookup gave no answer.");
                    DnsAnswer::NotFound
                }
                None => DnsAnswer::NotFound,
            }
        }
    }
}

/// Names are sent fully qualified so no search domain is ever appended.
fn absolute(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    }
}

/// Only records of the queried type; CNAMEs met along the way are dropped.
fn answers_of_type(lookup: &Lookup, record_type: RecordType) -> Vec<String> {
    lookup
        .record_iter()
        .filter(|record| record.record_type() == record_type)
        .filter_map(Record::data)
        .map(render_rdata)
        .collect()
}

fn classify(error: &ResolveError, servfail_as_not_found: bool) -> Failure {
    match error.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } => {
            classify_negative_response(*response_code, servfail_as_not_found, error)
        }
        ResolveErrorKind::Timeout => Failure::Timeout,
        ResolveErrorKind::Proto(proto) if matches!(proto.kind(), ProtoErrorKind::Timeout) => {
            Failure::Timeout
        }
        _ => {
            let message = error.to_string();
            if servfail_as_not_found && mentions_servfail(&message) {
                Failure::NotFound
            } else {
                Failure::Error(message)
            }
        }
    }
}

fn classify_negative_response(
    code: ResponseCode,
    servfail_as_not_found: bool,
    error: &impl ToString,
) -> Failure {
    if code == ResponseCode::ServFail && !servfail_as_not_found {
        Failure::Error(error.to_string())
    } else {
        Failure::NotFound
    }
}

fn mentions_servfail(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("servfail") || lower.contains("server failure")
}

/// Renders one record in presentation form.
///
/// TXT character-strings are double-quoted and space separated, so an SPF
/// policy reads `"v=spf1 ..."`.
pub fn render_rdata(rdata: &RData) -> String {
    match rdata {
        RData::TXT(txt) => txt
            .iter()
            .map(|chunk| format!("\"{}\"", String::from_utf8_lossy(chunk)))
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

#[cfg(test)]
pub mod testing {
    //! In-memory resolver used by the scanner tests.

    use super::*;
    use std::collections::HashMap;

    #[derive(Debug, Clone, Default)]
    pub struct StaticResolver {
        answers: HashMap<(String, RecordType), DnsAnswer>,
        wildcard_zone: Option<String>,
        panic_on: Option<String>,
    }

    impl StaticResolver {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(mut self, name: &str, record_type: RecordType, values: &[&str]) -> Self {
            let values = values.iter().map(|v| v.to_string()).collect();
            self.answers
                .insert((name.to_ascii_lowercase(), record_type), DnsAnswer::Found(values));
            self
        }

        pub fn with_error(mut self, name: &str, record_type: RecordType, message: &str) -> Self {
            self.answers.insert(
                (name.to_ascii_lowercase(), record_type),
                DnsAnswer::Error(message.to_string()),
            );
            self
        }

        /// Answers every A query below `zone`, like a `*.zone` record would.
        pub fn with_wildcard(mut self, zone: &str) -> Self {
            self.wildcard_zone = Some(zone.to_ascii_lowercase());
            self
        }

        /// Panics on any query for a name inside `zone`.
        pub fn panicking_for(mut self, zone: &str) -> Self {
            self.panic_on = Some(zone.to_ascii_lowercase());
            self
        }
    }

    impl DnsLookup for StaticResolver {
        async fn query(&self, name: &str, record_type: RecordType) -> DnsAnswer {
            let name = name.to_ascii_lowercase();
            if let Some(zone) = &self.panic_on {
                if name == *zone || name.ends_with(&format!(".{zone}")) {
                    panic!("resolver blew up on {name}");
                }
            }
            if let Some(answer) = self.answers.get(&(name.clone(), record_type)) {
                return answer.clone();
            }
            match &self.wildcard_zone {
                Some(zone) if record_type == RecordType::A && name.ends_with(&format!(".{zone}")) => {
                    DnsAnswer::Found(vec!["203.0.113.7".to_string()])
                }
                _ => DnsAnswer::NotFound,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_resolver::proto::op::Query;
    use hickory_resolver::proto::rr::Name;
    use hickory_resolver::proto::rr::rdata::{CNAME, TXT};
    use std::sync::Arc;

    #[test]
    fn txt_values_are_quoted_like_zone_files() {
        let single = RData::TXT(TXT::new(vec!["v=spf1 -all".to_string()]));
        assert_eq!(render_rdata(&single), "\"v=spf1 -all\"");

        let split = RData::TXT(TXT::new(vec!["v=DKIM1; k=rsa; ".to_string(), "p=MIGf".to_string()]));
        assert_eq!(render_rdata(&split), "\"v=DKIM1; k=rsa; \" \"p=MIGf\"");
    }

    #[test]
    fn timeouts_are_retryable() {
        let error = ResolveError::from(ResolveErrorKind::Timeout);
        assert_eq!(classify(&error, true), Failure::Timeout);
    }

    #[test]
    fn servfail_message_is_downgraded_only_when_enabled() {
        let error = ResolveError::from("upstream answered SERVFAIL");
        assert_eq!(classify(&error, true), Failure::NotFound);
        assert!(matches!(classify(&error, false), Failure::Error(_)));
    }

    #[test]
    fn other_errors_keep_their_message() {
        let error = ResolveError::from("socket closed unexpectedly");
        assert_eq!(
            classify(&error, true),
            Failure::Error("socket closed unexpectedly".to_string())
        );
    }

    #[test]
    fn negative_responses_are_not_found() {
        let error = ResolveError::from("no records");
        assert_eq!(
            classify_negative_response(ResponseCode::NXDomain, true, &error),
            Failure::NotFound
        );
        assert_eq!(
            classify_negative_response(ResponseCode::NoError, false, &error),
            Failure::NotFound
        );
        assert_eq!(
            classify_negative_response(ResponseCode::ServFail, true, &error),
            Failure::NotFound
        );
        assert_eq!(
            classify_negative_response(ResponseCode::ServFail, false, &error),
            Failure::Error("no records".to_string())
        );
    }

    fn txt(name: &Name, value: &str) -> Record {
        Record::from_rdata(name.clone(), 300, RData::TXT(TXT::new(vec![value.to_string()])))
    }

    #[test]
    fn cname_hops_are_not_reported_as_answers() {
        let selector = Name::from_ascii("k1._domainkey.example.com.").unwrap();
        let target = Name::from_ascii("dkim.mcsv.net.").unwrap();
        let records = vec![
            Record::from_rdata(selector.clone(), 300, RData::CNAME(CNAME(target.clone()))),
            txt(&target, "v=DKIM1; k=rsa; p=MIGf"),
        ];
        let lookup = Lookup::new_with_max_ttl(Query::query(selector, RecordType::TXT), Arc::from(records));

        assert_eq!(
            answers_of_type(&lookup, RecordType::TXT),
            vec!["\"v=DKIM1; k=rsa; p=MIGf\"".to_string()]
        );
    }

    #[test]
    fn cname_queries_keep_their_cname_records() {
        let name = Name::from_ascii("www.example.com.").unwrap();
        let target = Name::from_ascii("example.s3.amazonaws.com.").unwrap();
        let records = vec![Record::from_rdata(name.clone(), 300, RData::CNAME(CNAME(target)))];
        let lookup = Lookup::new_with_max_ttl(Query::query(name, RecordType::CNAME), Arc::from(records));

        assert_eq!(
            answers_of_type(&lookup, RecordType::CNAME),
            vec!["example.s3.amazonaws.com.".to_string()]
        );
    }

    #[test]
    fn queried_names_are_fully_qualified() {
        assert_eq!(absolute("wildcard-test-1.example.com"), "wildcard-test-1.example.com.");
        assert_eq!(absolute("example.com."), "example.com.");
    }

    #[tokio::test]
    async fn timeout_is_answered_by_the_fallback() {
        let answer = settle("example.com", RecordType::TXT, Err(Failure::Timeout), || async {
            Some(Ok(vec!["\"v=spf1 -all\"".to_string()]))
        })
        .await;
        assert_eq!(answer, DnsAnswer::Found(vec!["\"v=spf1 -all\"".to_string()]));
    }

    #[tokio::test]
    async fn fallback_failures_read_as_not_found() {
        let timed_out = settle("example.com", RecordType::A, Err(Failure::Timeout), || async {
            Some(Err(Failure::Timeout))
        })
        .await;
        assert_eq!(timed_out, DnsAnswer::NotFound);

        let failed = settle("example.com", RecordType::A, Err(Failure::Timeout), || async {
            Some(Err(Failure::Error("connection refused".to_string())))
        })
        .await;
        assert_eq!(failed, DnsAnswer::NotFound);

        let no_system = settle("example.com", RecordType::A, Err(Failure::Timeout), || async { None }).await;
        assert_eq!(no_system, DnsAnswer::NotFound);
    }

    #[tokio::test]
    async fn fallback_is_only_consulted_after_a_timeout() {
        async fn untouched() -> Option<Result<Vec<String>, Failure>> {
            panic!("fallback must not run")
        }
        assert_eq!(
            settle("example.com", RecordType::A, Err(Failure::NotFound), untouched).await,
            DnsAnswer::NotFound
        );
        assert_eq!(
            settle(
                "example.com",
                RecordType::A,
                Err(Failure::Error("refused".to_string())),
                untouched
            )
            .await,
            DnsAnswer::Error("refused".to_string())
        );
        assert_eq!(
            settle("example.com", RecordType::A, Ok(vec!["192.0.2.1".to_string()]), untouched).await,
            DnsAnswer::Found(vec!["192.0.2.1".to_string()])
        );
    }

    #[tokio::test]
    async fn static_resolver_wildcard_only_answers_a_queries() {
        let resolver = testing::StaticResolver::new().with_wildcard("example.com");
        assert!(resolver.query("anything.example.com", RecordType::A).await.is_found());
        assert_eq!(
            resolver.query("anything.example.com", RecordType::CNAME).await,
            DnsAnswer::NotFound
        );
    }
}
