//! Consolidated URL cleaning and normalization, shared by the engine adapter
//! (cleaning extracted URLs) and the filter pipeline (normalized-mode dedup).

use std::borrow::Cow;

use percent_encoding::percent_decode_str;
use url::Url;

/// Tracking query parameters stripped in `normalized` dedup mode.
/// Treated as normative across engines rather than per-engine.
pub const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "utm_id",
    "fbclid",
    "gclid",
    "msclkid",
    "mc_cid",
    "mc_eid",
    "_ga",
    "_gl",
    "ref",
    "ref_src",
    "igshid",
    "spm",
];

/// Expand the handful of HTML entities known to appear in extracted URLs.
fn expand_entities(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }
    let replaced = s
        .replace("&amp;", "&")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">");
    Cow::Owned(replaced)
}

/// Percent-decode then expand entities, in that order (redirect params are
/// percent-encoded *before* any entity-escaping a template might have added).
pub fn decode_candidate(raw: &str) -> String {
    let decoded = percent_decode_str(raw).decode_utf8_lossy();
    expand_entities(&decoded).into_owned()
}

/// Pull `q=` (falling back to `url=`) out of a redirect-style `/url?...`
/// candidate. Returns the raw (still encoded) value if present.
pub fn redirect_target(query: &str) -> Option<&str> {
    for pair in query.split('&') {
        let mut kv = pair.splitn(2, '=');
        let key = kv.next()?;
        let val = kv.next()?;
        if key == "q" {
            return Some(val);
        }
    }
    for pair in query.split('&') {
        let mut kv = pair.splitn(2, '=');
        let key = kv.next()?;
        let val = kv.next()?;
        if key == "url" {
            return Some(val);
        }
    }
    None
}

/// A cleaned, validated absolute URL has a non-empty http(s) scheme and host.
pub fn is_valid_result_url(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
}

/// Registrable ("top") domain derivation lives in `filter::tld`; this only
/// extracts the bare host, lowercased, for self-URL/exclude-domain checks.
pub fn host_of(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_ascii_lowercase())
}

/// Whether `host` is exactly `domain` or a subdomain of it (`*.domain`).
pub fn host_matches_or_subdomain(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{domain}"))
}

/// Normalize a URL per the `normalized` dedup mode rules:
/// lowercase scheme/host, elide default ports, strip trailing slash on
/// non-root paths, drop the fragment, remove tracking params, sort the
/// remaining params lexicographically, and omit an empty query string.
pub fn normalize(url: &Url) -> String {
    let mut normalized = url.clone();
    let _ = normalized.set_scheme(&url.scheme().to_ascii_lowercase());
    if let Some(host) = url.host_str() {
        let _ = normalized.set_host(Some(&host.to_ascii_lowercase()));
    }

    let default_port = match normalized.scheme() {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    };
    if normalized.port() == default_port {
        let _ = normalized.set_port(None);
    }

    normalized.set_fragment(None);

    let mut kept: Vec<(String, String)> = normalized
        .query_pairs()
        .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    kept.sort_by(|a, b| a.0.cmp(&b.0));
    if kept.is_empty() {
        normalized.set_query(None);
    } else {
        let qs = kept
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        normalized.set_query(Some(&qs));
    }

    let path = normalized.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/').to_string();
        normalized.set_path(&trimmed);
    }

    normalized.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_core_entities() {
        assert_eq!(expand_entities("a&amp;b&#39;c&quot;d"), "a&b'c\"d");
    }

    #[test]
    fn redirect_target_prefers_q_over_url() {
        assert_eq!(
            redirect_target("q=https://a.example&url=https://b.example"),
            Some("https://a.example")
        );
        assert_eq!(
            redirect_target("url=https://b.example"),
            Some("https://b.example")
        );
        assert_eq!(redirect_target("sa=t&ved=123"), None);
    }

    #[test]
    fn normalize_strips_tracking_lowercases_and_sorts() {
        let url = Url::parse(
            "HTTPS://Example.COM:443/path/?utm_source=x&b=2&a=1#frag",
        )
        .unwrap();
        assert_eq!(normalize(&url), "https://example.com/path?a=1&b=2");
    }

    #[test]
    fn normalize_keeps_root_path_slash() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(normalize(&url), "https://example.com/");
    }

    #[test]
    fn normalize_drops_empty_query() {
        let url = Url::parse("https://example.com/path/?utm_source=only").unwrap();
        assert_eq!(normalize(&url), "https://example.com/path");
    }

    #[test]
    fn host_matches_subdomain_but_not_unrelated_suffix() {
        assert!(host_matches_or_subdomain("mail.example.com", "example.com"));
        assert!(host_matches_or_subdomain("example.com", "example.com"));
        assert!(!host_matches_or_subdomain("notexample.com", "example.com"));
    }
}
