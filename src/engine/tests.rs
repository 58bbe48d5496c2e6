use super::*;

fn adapter() -> EngineAdapter {
    EngineAdapter::new(EngineConfig::default())
}

/// S6: pagination URL build.
#[test]
fn s6_pagination_url_build() {
    let e = adapter();
    let paged = e.build_url("test", 2, 20);
    assert!(paged.contains("start=40"));
    assert!(paged.contains("num=20"));

    let first_page = e.build_url("test", 0, 20);
    assert!(!first_page.contains("start="));
}

#[test]
fn build_url_percent_encodes_query() {
    let e = adapter();
    let url = e.build_url("rust lang", 0, 10);
    assert!(url.contains("q=rust%20lang"));
}

#[test]
fn build_url_emits_safe_active_only_when_enabled() {
    let mut cfg = EngineConfig::default();
    cfg.safe_search = true;
    let e = EngineAdapter::new(cfg);
    assert!(e.build_url("x", 0, 10).contains("safe=active"));
    assert!(!adapter().build_url("x", 0, 10).contains("safe=active"));
}

/// S5: classification table.
#[test]
fn s5_classifies_captcha() {
    let e = adapter();
    assert_eq!(
        e.classify_response(r#"<div class="g-recaptcha"></div>"#),
        Classification::Captcha
    );
}

#[test]
fn s5_classifies_blocked() {
    let e = adapter();
    assert_eq!(
        e.classify_response("Access Denied - Your IP has been blocked"),
        Classification::Blocked
    );
}

#[test]
fn s5_classifies_empty() {
    let e = adapter();
    assert_eq!(
        e.classify_response("Your search did not match any documents"),
        Classification::Empty
    );
}

#[test]
fn s5_classifies_ok_with_extracted_urls() {
    let e = adapter();
    let body = format!(
        "<html>{}<div class=\"g\"><a href=\"https://example.com\">Example</a></div>",
        "padding ".repeat(200)
    );
    assert_eq!(e.classify_response(&body), Classification::Ok);
    let urls = e.extract_urls(&body);
    assert!(!urls.is_empty());
    assert_eq!(urls[0].url, "https://example.com/");
}

#[test]
fn short_non_html_body_is_blocked() {
    let e = adapter();
    assert_eq!(e.classify_response("short"), Classification::Blocked);
}

/// S4: URL cleaning table.
#[test]
fn s4_redirect_style_url_is_cleaned_to_target() {
    let e = adapter();
    let body = r#"<a href="/url?q=https://example.com/page&sa=U">link</a>"#;
    let urls = e.extract_urls(body);
    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0].url, "https://example.com/page");
    assert_eq!(urls[0].position, 1);
}

#[test]
fn s4_entity_escaped_query_is_expanded() {
    let e = adapter();
    let body = r#"<span data-href="https://example.com/page?a=1&amp;b=2"></span>"#;
    let urls = e.extract_urls(body);
    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0].url, "https://example.com/page?a=1&b=2");
}

#[test]
fn s4_non_http_scheme_candidate_is_rejected() {
    let e = adapter();
    let body = r#"<span data-href="javascript:alert(1)"></span>"#;
    assert!(e.extract_urls(body).is_empty());
}

#[test]
fn s4_schemeless_candidate_is_never_extracted() {
    let e = adapter();
    let body = r#"<div class="g"><a href="example.com/page">text</a></div>"#;
    assert!(e.extract_urls(body).is_empty());
}

#[test]
fn extract_urls_dedupes_across_patterns_and_numbers_from_one() {
    let e = adapter();
    let body = r#"
        <cite>https://example.com/a</cite>
        <span data-href="https://example.com/a"></span>
        <span data-href="https://example.com/b"></span>
    "#;
    let urls = e.extract_urls(body);
    assert_eq!(urls.len(), 2);
    assert_eq!(urls[0].position, 1);
    assert_eq!(urls[0].url, "https://example.com/a");
    assert_eq!(urls[1].position, 2);
    assert_eq!(urls[1].url, "https://example.com/b");
}

#[test]
fn extract_urls_excludes_self_and_configured_domains() {
    let mut cfg = EngineConfig::default();
    cfg.exclude_domains.push("blocked.example".to_string());
    let e = EngineAdapter::new(cfg);
    let body = r#"
        <span data-href="https://www.google.com/policies"></span>
        <span data-href="https://sub.blocked.example/x"></span>
        <span data-href="https://good.example/x"></span>
    "#;
    let urls = e.extract_urls(body);
    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0].url, "https://good.example/x");
}

#[test]
fn json_ld_fallback_is_extracted() {
    let e = adapter();
    let body = r#"
        <script type="application/ld+json">
        {"@context":"https://schema.org","url":"https://example.com/jsonld"}
        </script>
    "#;
    let urls = e.extract_urls(body);
    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0].url, "https://example.com/jsonld");
}
