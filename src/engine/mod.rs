//! Engine adapter: stateless translation between the scheduler's task
//! vocabulary and one search engine's actual HTTP surface.
//!
//! Everything here is configured once at construction and never mutates
//! afterwards, so `EngineAdapter` is `Clone` and shared freely across the
//! worker tasks the scheduler spawns.

mod patterns;
mod url_clean;

#[cfg(test)]
mod tests;

pub use url_clean::{host_matches_or_subdomain, normalize, TRACKING_PARAMS};

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use url::Url;

use patterns::{ExtractionPatterns, BLOCKED_MARKERS, CAPTCHA_MARKERS, EMPTY_MARKERS, MIN_PLAUSIBLE_BODY_LEN};

/// How a response body was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Ok,
    Captcha,
    Blocked,
    Empty,
}

/// A URL discovered in a result page, with its 1-based emission position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedUrl {
    pub position: usize,
    pub url: String,
}

/// Engine-own domains and well-known affiliates excluded from extraction
/// results regardless of configured exclude-domain entries.
const SELF_AND_AFFILIATE_DOMAINS: &[&str] = &[
    "google.com",
    "googleusercontent.com",
    "googleadservices.com",
    "doubleclick.net",
    "gstatic.com",
];

/// Engine adapter configuration, set once and never mutated.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub host: String,
    pub language: String,
    pub country: String,
    pub safe_search: bool,
    pub exclude_domains: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: "https://www.google.com/search".to_string(),
            language: "en".to_string(),
            country: "us".to_string(),
            safe_search: false,
            exclude_domains: Vec::new(),
        }
    }
}

/// Stateless adapter for one search engine.
#[derive(Debug, Clone)]
pub struct EngineAdapter {
    config: EngineConfig,
}

impl EngineAdapter {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Canonical result URL for `query` at `page` with `results_per_page`
    /// results per page. Page 0 omits `start` entirely.
    pub fn build_url(&self, query: &str, page: u32, results_per_page: u32) -> String {
        let mut params = vec![
            ("q".to_string(), query.to_string()),
            ("hl".to_string(), self.config.language.clone()),
            ("gl".to_string(), self.config.country.clone()),
            ("num".to_string(), results_per_page.to_string()),
            ("ie".to_string(), "UTF-8".to_string()),
            ("oe".to_string(), "UTF-8".to_string()),
        ];
        if self.config.safe_search {
            params.push(("safe".to_string(), "active".to_string()));
        }
        if page > 0 {
            params.push(("start".to_string(), (page * results_per_page).to_string()));
        }

        let query_string = params
            .iter()
            .map(|(k, v)| format!("{k}={}", utf8_percent_encode(v, NON_ALPHANUMERIC)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{}", self.config.host, query_string)
    }

    /// Classify a response body. Predicates run captcha → blocked → empty →
    /// ok over a case-folded copy; the first positive match short-circuits.
    pub fn classify_response(&self, body_text: &str) -> Classification {
        let folded = body_text.to_ascii_lowercase();

        if CAPTCHA_MARKERS.iter().any(|m| folded.contains(m)) {
            return Classification::Captcha;
        }
        if BLOCKED_MARKERS.iter().any(|m| folded.contains(m)) {
            return Classification::Blocked;
        }
        if folded.len() < MIN_PLAUSIBLE_BODY_LEN && !folded.contains("<html") {
            return Classification::Blocked;
        }
        if EMPTY_MARKERS.iter().any(|m| folded.contains(m)) {
            return Classification::Empty;
        }
        Classification::Ok
    }

    /// Extract result URLs from a response body, in emission order, deduped
    /// by cleaned URL and numbered from 1.
    pub fn extract_urls(&self, body_text: &str) -> Vec<ExtractedUrl> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();

        let mut push_candidate = |raw: &str, seen: &mut std::collections::HashSet<String>, out: &mut Vec<ExtractedUrl>| {
            if let Some(cleaned) = self.clean_candidate(raw) {
                if seen.insert(cleaned.clone()) {
                    out.push(ExtractedUrl {
                        position: out.len() + 1,
                        url: cleaned,
                    });
                }
            }
        };

        for m in ExtractionPatterns::redirect(body_text) {
            // m is the whole `/url?...` match; strip the leading `/url?`.
            if let Some(query) = m.strip_prefix("/url?").or_else(|| m.strip_prefix("/URL?")) {
                if let Some(target) = url_clean::redirect_target(query) {
                    push_candidate(target, &mut seen, &mut out);
                }
            }
        }
        for href in ExtractionPatterns::anchor_href(body_text) {
            push_candidate(href, &mut seen, &mut out);
        }
        for cite in ExtractionPatterns::cite(body_text) {
            push_candidate(cite, &mut seen, &mut out);
        }
        for href in ExtractionPatterns::data_href(body_text) {
            push_candidate(href, &mut seen, &mut out);
        }
        for url in ExtractionPatterns::json_ld(body_text) {
            push_candidate(&url, &mut seen, &mut out);
        }

        out
    }

    /// Decode, validate, and filter one extraction candidate. Returns `None`
    /// if the candidate is malformed or excluded.
    fn clean_candidate(&self, raw: &str) -> Option<String> {
        let decoded = url_clean::decode_candidate(raw);
        let parsed = Url::parse(&decoded).ok()?;
        if !url_clean::is_valid_result_url(&parsed) {
            return None;
        }
        let host = url_clean::host_of(&parsed)?;

        if SELF_AND_AFFILIATE_DOMAINS
            .iter()
            .any(|d| host_matches_or_subdomain(&host, d))
        {
            return None;
        }
        if self
            .config
            .exclude_domains
            .iter()
            .any(|d| host_matches_or_subdomain(&host, d))
        {
            return None;
        }

        Some(parsed.to_string())
    }
}
