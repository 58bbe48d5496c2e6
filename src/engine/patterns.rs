//! Literal substring and pattern tables driving response classification and
//! URL extraction. Keeping these as data means upstream HTML drift
//! is repaired here, never in the scheduler.

use std::sync::OnceLock;

use regex::Regex;

/// Case-folded substrings that mark a response as a captcha challenge.
pub const CAPTCHA_MARKERS: &[&str] = &[
    "captcha",
    "recaptcha",
    "g-recaptcha",
    "unusual traffic",
    "automated queries",
    "/sorry/",
    "ipv4.google.com/sorry",
    "please verify",
    "not a robot",
    "verify you're human",
    "solve this puzzle",
];

/// Case-folded substrings that mark a response as blocked.
pub const BLOCKED_MARKERS: &[&str] = &[
    "403 forbidden",
    "access denied",
    "blocked",
    "your ip has been",
    "temporarily blocked",
    "unusual traffic from your computer",
    "too many requests",
    "rate limit",
];

/// Case-folded substrings that mark a response as an empty result set.
pub const EMPTY_MARKERS: &[&str] = &[
    "did not match any documents",
    "no results found",
    "your search -",
    "did not return any results",
];

/// Below this length, a body lacking `<html` is also classified as blocked.
pub const MIN_PLAUSIBLE_BODY_LEN: usize = 1000;

fn redirect_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)/url\?([^"'\s<>]+)"#).unwrap())
}

fn anchor_href_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)class="[^"]*\bg\b[^"]*"[^>]*>.*?<a[^>]+href="(https?://[^"]+)""#)
            .unwrap()
    })
}

fn cite_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)<cite[^>]*>\s*(https?://[^<\s]+)"#).unwrap())
}

fn data_href_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)data-href="(https?://[^"]+)""#).unwrap())
}

fn json_ld_script_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<script[^>]+type="application/ld\+json"[^>]*>(.*?)</script>"#).unwrap()
    })
}

fn json_ld_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""url"\s*:\s*"(https?://[^"]+)""#).unwrap())
}

/// The four text patterns plus the JSON-LD fallback, in extraction order.
pub struct ExtractionPatterns;

impl ExtractionPatterns {
    pub fn redirect(body: &str) -> impl Iterator<Item = &str> {
        redirect_url_re().find_iter(body).map(|m| m.as_str())
    }

    pub fn anchor_href(body: &str) -> impl Iterator<Item = &str> + '_ {
        anchor_href_re()
            .captures_iter(body)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
    }

    pub fn cite(body: &str) -> impl Iterator<Item = &str> + '_ {
        cite_re()
            .captures_iter(body)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
    }

    pub fn data_href(body: &str) -> impl Iterator<Item = &str> + '_ {
        data_href_re()
            .captures_iter(body)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
    }

    pub fn json_ld(body: &str) -> impl Iterator<Item = String> + '_ {
        json_ld_script_re()
            .captures_iter(body)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .flat_map(|script| {
                json_ld_url_re()
                    .captures_iter(&script)
                    .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
                    .collect::<Vec<_>>()
            })
    }
}
