//! Filter Pipeline — component D.
//!
//! Owns the 14-step per-URL decision procedure, the dedup strategy, and the
//! anti-public-domain gate backed by the domain ledger. `FilterPipeline` is
//! shared mutable state behind one lock (the dedup structures), same posture
//! as `ProxyPool` and `TaskQueue`: no lock held across I/O, and the ledger
//! write (the only I/O this component performs) happens after the lock guarding
//! the dedup structures is released.

pub mod dedup;
pub mod ledger;
pub mod tld;


use std::sync::Mutex;

use url::Url;

use dedup::{DedupConfig, Deduplicator};
use ledger::LedgerSink;
use tld::registrable_domain;

/// Why a candidate URL was rejected; the decision procedure stops at the
/// first failing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Empty,
    LengthOutOfRange,
    NoHost,
    InvalidHostSyntax,
    TldNotWhitelisted,
    TldBlacklisted,
    DomainNotWhitelisted,
    DomainBlacklisted,
    ExtensionBlacklisted,
    ExtensionNotWhitelisted,
    KeywordIncludeMissing,
    KeywordExcludeMatched,
    MissingQueryParams,
    PublicDomain,
    Duplicate,
}

/// An accepted URL and the metadata recorded alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRecord {
    pub url: String,
    pub domain: String,
    pub top_domain: String,
    pub has_query_params: bool,
}

/// Domain-pattern entry for whitelist/blacklist matching: literal host, or
/// `*.suffix` matching that host and any of its subdomains.
fn domain_pattern_matches(host: &str, pattern: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(suffix) => host == suffix || host.ends_with(&format!(".{suffix}")),
        None => host == pattern,
    }
}

fn any_pattern_matches(host: &str, top_domain: &str, patterns: &[String]) -> bool {
    patterns
        .iter()
        .any(|p| domain_pattern_matches(host, p) || domain_pattern_matches(top_domain, p))
}

/// Tunable knobs for the 14-step decision procedure.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub min_url_length: usize,
    pub max_url_length: usize,
    pub tld_whitelist: Option<Vec<String>>,
    pub tld_blacklist: Option<Vec<String>>,
    pub domain_whitelist: Option<Vec<String>>,
    pub domain_blacklist: Option<Vec<String>>,
    pub extension_blacklist: Vec<String>,
    pub extension_whitelist: Option<Vec<String>>,
    pub keyword_include: Vec<String>,
    pub keyword_exclude: Vec<String>,
    pub url_params_only: bool,
    pub anti_public_enabled: bool,
    pub anti_public_track: bool,
    pub dedup: DedupConfig,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_url_length: 10,
            max_url_length: 2000,
            tld_whitelist: None,
            tld_blacklist: None,
            domain_whitelist: None,
            domain_blacklist: None,
            extension_blacklist: default_extension_blacklist(),
            extension_whitelist: None,
            keyword_include: Vec::new(),
            keyword_exclude: Vec::new(),
            url_params_only: false,
            anti_public_enabled: false,
            anti_public_track: false,
            dedup: DedupConfig::default(),
        }
    }
}

fn default_extension_blacklist() -> Vec<String> {
    [
        "jpg", "jpeg", "png", "gif", "svg", "webp", "ico", "bmp", "css", "js", "woff", "woff2",
        "ttf", "eot", "mp4", "mp3", "avi", "mov", "pdf", "zip",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Set of public-domain hosts the anti-public step rejects against. A plain `Vec` is sufficient — this set is small and
/// loaded once at construction, unlike the unbounded dedup structures.
#[derive(Debug, Clone, Default)]
pub struct PublicDomainSet {
    domains: Vec<String>,
}

impl PublicDomainSet {
    pub fn new(domains: Vec<String>) -> Self {
        Self {
            domains: domains.into_iter().map(|d| d.to_ascii_lowercase()).collect(),
        }
    }

    fn contains_or_parent_of(&self, host: &str) -> bool {
        self.domains
            .iter()
            .any(|d| host == d || host.ends_with(&format!(".{d}")))
    }
}

struct Inner {
    dedup: Deduplicator,
}

/// The per-URL decision procedure plus the shared dedup/ledger state. Stateless config; the only mutable state is the dedup structure,
/// guarded by one lock, and the (externally durable) ledger.
pub struct FilterPipeline {
    config: FilterConfig,
    public_domains: PublicDomainSet,
    inner: Mutex<Inner>,
    ledger: Option<Box<dyn LedgerSink>>,
}

impl FilterPipeline {
    pub fn new(config: FilterConfig, public_domains: PublicDomainSet) -> Self {
        let dedup = Deduplicator::new(config.dedup);
        Self {
            config,
            public_domains,
            inner: Mutex::new(Inner { dedup }),
            ledger: None,
        }
    }

    pub fn with_ledger(mut self, ledger: Box<dyn LedgerSink>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Run the 14-step decision procedure against every candidate, in
    /// order; the first failing step is recorded as the reject reason and
    /// no later step runs. Returns the accepted records in input order.
    pub fn filter(&self, urls: &[String]) -> Vec<UrlRecord> {
        urls.iter().filter_map(|u| self.check(u).ok()).collect()
    }

    /// Evaluate one URL, returning its record on acceptance or the step
    /// that rejected it.
    pub fn check(&self, raw: &str) -> Result<UrlRecord, RejectReason> {
        // 1. Presence and type check.
        if raw.is_empty() {
            return Err(RejectReason::Empty);
        }
        // 2. Length bounds.
        if raw.len() < self.config.min_url_length || raw.len() > self.config.max_url_length {
            return Err(RejectReason::LengthOutOfRange);
        }
        // 3. Host derivable.
        let parsed = Url::parse(raw).map_err(|_| RejectReason::NoHost)?;
        let host = parsed
            .host_str()
            .map(|h| h.to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .ok_or(RejectReason::NoHost)?;
        // 4. Basic domain validity (label syntax).
        if !is_valid_host_syntax(&host) {
            return Err(RejectReason::InvalidHostSyntax);
        }

        let top_domain = registrable_domain(&host);

        // 5. TLD whitelist.
        if let Some(whitelist) = &self.config.tld_whitelist {
            if !matches_any_tld(&top_domain, whitelist) {
                return Err(RejectReason::TldNotWhitelisted);
            }
        }
        // 6. TLD blacklist.
        if let Some(blacklist) = &self.config.tld_blacklist {
            if matches_any_tld(&top_domain, blacklist) {
                return Err(RejectReason::TldBlacklisted);
            }
        }
        // 7. Domain whitelist.
        if let Some(whitelist) = &self.config.domain_whitelist {
            if !any_pattern_matches(&host, &top_domain, whitelist) {
                return Err(RejectReason::DomainNotWhitelisted);
            }
        }
        // 8. Domain blacklist.
        if let Some(blacklist) = &self.config.domain_blacklist {
            if any_pattern_matches(&host, &top_domain, blacklist) {
                return Err(RejectReason::DomainBlacklisted);
            }
        }
        // 9. Extension gate.
        if let Some(ext) = path_extension(&parsed) {
            if self.config.extension_blacklist.iter().any(|e| e == &ext) {
                return Err(RejectReason::ExtensionBlacklisted);
            }
            if let Some(whitelist) = &self.config.extension_whitelist {
                if !whitelist.iter().any(|e| e == &ext) {
                    return Err(RejectReason::ExtensionNotWhitelisted);
                }
            }
        }
        // 10. Keyword-include.
        if !self.config.keyword_include.is_empty() {
            let folded = raw.to_ascii_lowercase();
            if !self
                .config
                .keyword_include
                .iter()
                .any(|k| folded.contains(&k.to_ascii_lowercase()))
            {
                return Err(RejectReason::KeywordIncludeMissing);
            }
        }
        // 11. Keyword-exclude.
        if !self.config.keyword_exclude.is_empty() {
            let folded = raw.to_ascii_lowercase();
            if self
                .config
                .keyword_exclude
                .iter()
                .any(|k| folded.contains(&k.to_ascii_lowercase()))
            {
                return Err(RejectReason::KeywordExcludeMatched);
            }
        }
        // 12. urlParamsOnly.
        let has_query_params = raw.contains('?') && raw.contains('=');
        if self.config.url_params_only && !has_query_params {
            return Err(RejectReason::MissingQueryParams);
        }
        // 13. Anti-public.
        if self.config.anti_public_enabled && self.public_domains.contains_or_parent_of(&host) {
            return Err(RejectReason::PublicDomain);
        }

        // 14. Deduplication — the only step that mutates shared state, so it
        // runs last: a URL rejected by an earlier step must never be marked
        // "seen" by the dedup structure.
        let accepted = {
            let mut inner = self.inner.lock().unwrap();
            inner.dedup.check_and_insert(&parsed)
        };
        if !accepted {
            return Err(RejectReason::Duplicate);
        }

        if self.config.anti_public_enabled && self.config.anti_public_track {
            if let Some(ledger) = &self.ledger {
                let _ = ledger.record(&host, &top_domain, "engine");
            }
        }

        Ok(UrlRecord {
            url: parsed.to_string(),
            domain: host,
            top_domain,
            has_query_params,
        })
    }
}

fn is_valid_host_syntax(host: &str) -> bool {
    if host.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }
    if host.is_empty() || host.len() > 253 {
        return false;
    }
    host.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    })
}

/// The final path extension token, if it is a single short (<=10 char)
/// alphanumeric suffix after the last `.`.
fn path_extension(url: &Url) -> Option<String> {
    let path = url.path();
    let last_segment = path.rsplit('/').next()?;
    let (_, ext) = last_segment.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 10 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// The public-suffix portion of a registrable domain: `example.com` -> `com`,
/// `example.co.uk` -> `co.uk` (the registrable domain always contributes
/// exactly one label ahead of its public suffix).
fn tld_of(top_domain: &str) -> &str {
    top_domain.split_once('.').map_or(top_domain, |(_, rest)| rest)
}

fn matches_any_tld(top_domain: &str, tlds: &[String]) -> bool {
    let tld = tld_of(top_domain);
    tlds.iter().any(|t| t.trim_start_matches('.') == tld)
}
