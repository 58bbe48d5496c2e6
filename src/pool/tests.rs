use super::*;
use std::thread::sleep;

fn test_proxy(id: &str) -> Proxy {
    Proxy::new(
        id.to_string(),
        Endpoint {
            host: id.to_string(),
            port: 8080,
            credentials: None,
        },
        Protocol::Http,
    )
}

/// S1: quarantine after threshold.
#[test]
fn s1_quarantine_after_threshold_failures() {
    let pool = ProxyPool::new(PoolConfig {
        max_failures: 3,
        ..Default::default()
    });
    pool.add(test_proxy("test_1")).unwrap();

    pool.report_failure("test_1");
    pool.report_failure("test_1");
    pool.report_failure("test_1");

    let stats = pool.stats();
    assert_eq!(stats.alive, 0);
    assert_eq!(stats.quarantined, 1);
}

/// S2: revive after cooldown via health check.
#[test]
fn s2_revive_after_cooldown() {
    let pool = ProxyPool::new(PoolConfig {
        cooldown: Duration::from_millis(100),
        ..Default::default()
    });
    pool.add(test_proxy("p1")).unwrap();
    pool.report_block("p1");

    assert_eq!(pool.stats().quarantined, 1);

    sleep(Duration::from_millis(200));
    pool.perform_health_check();

    let stats = pool.stats();
    assert_eq!(stats.alive, 1);
    assert_eq!(stats.quarantined, 0);
}

/// S3: weighted preference under divergent outcomes.
#[test]
fn s3_weighted_preference_favors_good_proxy() {
    // MaxFailures raised so "bad" stays alive and selectable despite 8
    // failures (default MaxFailures=5 would quarantine it first).
    let pool = ProxyPool::new(PoolConfig {
        max_failures: 100,
        ..Default::default()
    });
    pool.add(test_proxy("good")).unwrap();
    pool.add(test_proxy("bad")).unwrap();
    for _ in 0..10 {
        pool.report_success("good", Duration::from_millis(50));
    }
    for _ in 0..8 {
        pool.report_failure("bad");
    }
    for _ in 0..2 {
        pool.report_success("bad", Duration::from_millis(500));
    }

    let mut good_count = 0;
    let mut bad_count = 0;
    for _ in 0..100 {
        match pool.get() {
            Ok(p) if p.id == "good" => good_count += 1,
            Ok(p) if p.id == "bad" => bad_count += 1,
            _ => {}
        }
    }

    assert!(
        good_count > bad_count,
        "expected good ({good_count}) > bad ({bad_count})"
    );
}

#[test]
fn empty_pool_returns_no_available() {
    let pool = ProxyPool::new(PoolConfig::default());
    assert!(matches!(pool.get(), Err(CoreError::NoAvailable)));
}

#[test]
fn add_duplicate_id_errors() {
    let pool = ProxyPool::new(PoolConfig::default());
    pool.add(test_proxy("dup")).unwrap();
    assert!(matches!(
        pool.add(test_proxy("dup")),
        Err(CoreError::AlreadyExists(_))
    ));
}

#[test]
fn captcha_keeps_proxy_alive_but_skipped_until_cooldown_expires() {
    let pool = ProxyPool::new(PoolConfig {
        cooldown: Duration::from_millis(50),
        ..Default::default()
    });
    pool.add(test_proxy("p1")).unwrap();
    pool.report_captcha("p1");

    // Still counted as alive...
    assert_eq!(pool.stats().alive, 1);
    // ...but not selectable.
    assert!(matches!(pool.get(), Err(CoreError::NoAvailable)));

    sleep(Duration::from_millis(80));
    assert!(pool.get().is_ok());
}

#[test]
fn sustained_low_success_gets_quarantined_by_health_check() {
    let pool = ProxyPool::new(PoolConfig {
        min_requests_for_health_check: 10,
        min_success_rate: 0.5,
        max_failures: 1000,
        ..Default::default()
    });
    pool.add(test_proxy("flaky")).unwrap();
    for _ in 0..2 {
        pool.report_success("flaky", Duration::from_millis(10));
    }
    for _ in 0..8 {
        pool.report_failure("flaky");
    }

    pool.perform_health_check();
    assert_eq!(pool.stats().quarantined, 1);
}

/// A proxy subjected to MaxFailures consecutive failures is never returned by
/// `get` again until a health-check revive.
#[test]
fn quarantined_proxy_never_returned_until_revive() {
    let pool = ProxyPool::new(PoolConfig {
        max_failures: 3,
        cooldown: Duration::from_millis(30),
        ..Default::default()
    });
    pool.add(test_proxy("only")).unwrap();
    pool.report_failure("only");
    pool.report_failure("only");
    pool.report_failure("only");

    assert!(matches!(pool.get(), Err(CoreError::NoAvailable)));

    // An unset cooldown_until is vacuously expired, so the next health check
    // revives it (ReportFailure never sets a cooldown itself).
    pool.perform_health_check();
    assert!(pool.get().is_ok());
}
