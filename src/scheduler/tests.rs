use std::sync::Arc;
use std::time::Duration;

use crate::engine::{EngineAdapter, EngineConfig};
use crate::error::CoreError;
use crate::filter::{FilterConfig, FilterPipeline, PublicDomainSet};
use crate::http::fake::ScriptedExecutor;
use crate::pool::{Endpoint, PoolConfig, Protocol, Proxy, ProxyPool, ProxyStatus};
use crate::queue::{QueueConfig, TaskQueue};
use crate::sinks::{NullErrorSink, NullProgressSink, NullResultSink};

use super::*;

fn one_proxy_pool() -> Arc<ProxyPool> {
    let pool = Arc::new(ProxyPool::new(PoolConfig::default()));
    pool.add(Proxy::new(
        "p1".to_string(),
        Endpoint {
            host: "127.0.0.1".to_string(),
            port: 8080,
            credentials: None,
        },
        Protocol::Http,
    ))
    .unwrap();
    pool
}

fn plain_engine() -> EngineAdapter {
    EngineAdapter::new(EngineConfig::default())
}

fn plain_filter() -> Arc<FilterPipeline> {
    Arc::new(FilterPipeline::new(FilterConfig::default(), PublicDomainSet::default()))
}

fn scheduler_with(
    executor: ScriptedExecutor,
    config: SchedulerConfig,
) -> Arc<Scheduler> {
    Arc::new(Scheduler::new(
        one_proxy_pool(),
        Arc::new(TaskQueue::new(QueueConfig::default())),
        plain_filter(),
        plain_engine(),
        Arc::new(executor),
        Arc::new(NullProgressSink),
        Arc::new(NullResultSink),
        Arc::new(NullErrorSink),
        config,
    ))
}

/// One dork, one ok response carrying three distinct-domain result URLs, no
/// pagination — the scheduler should run the single task to completion, emit
/// three accepted records, and reach `Completed`.
#[tokio::test]
async fn end_to_end_single_dork_three_urls_reaches_completed() {
    let body = format!(
        "<html><body>{}{}{}</body></html>",
        r#"<a href="/url?q=https://a.example/page&amp;sa=U">A</a>"#,
        r#"<a href="/url?q=https://b.example/page&amp;sa=U">B</a>"#,
        r#"<a href="/url?q=https://c.example/page&amp;sa=U">C</a>"#,
    );
    let executor = ScriptedExecutor::new(vec![Ok(body)]);
    let scheduler = scheduler_with(executor, SchedulerConfig::default());

    assert!(scheduler.start(&["site:example.com".to_string()]));
    let stats = scheduler.clone().run().await;

    assert_eq!(stats.state, SchedulerState::Completed);
    assert_eq!(stats.completed_dorks, 1);
    assert_eq!(stats.failed_dorks, 0);
    assert_eq!(stats.unique_urls, 3);
    assert_eq!(stats.total_urls, 3);

    let proxy = scheduler.pool.get_by_id("p1").unwrap();
    assert_eq!(proxy.successes, 1);
    assert_eq!(proxy.status, ProxyStatus::Alive);
}

/// A captcha-classified response should cool the proxy down, shrink
/// concurrency, and retry the dork rather than fail it outright (the queue's
/// default retry budget is 3). Cooldown is set to zero so the retry doesn't
/// have to wait out the pool's default 30s quarantine in real wall-clock time.
#[tokio::test]
async fn captcha_response_shrinks_concurrency_and_retries() {
    let captcha_body = "<html>please solve this captcha to continue</html>".repeat(50);
    let ok_body = format!(
        "<html><body>{}</body></html>",
        r#"<a href="/url?q=https://ok.example/page&amp;sa=U">ok</a>"#
    );
    let executor = ScriptedExecutor::new(vec![Ok(captcha_body), Ok(ok_body)]);

    let mut pool_config = PoolConfig::default();
    pool_config.cooldown = Duration::from_millis(0);
    let pool = Arc::new(ProxyPool::new(pool_config));
    pool.add(Proxy::new(
        "p1".to_string(),
        Endpoint {
            host: "127.0.0.1".to_string(),
            port: 8080,
            credentials: None,
        },
        Protocol::Http,
    ))
    .unwrap();

    let scheduler = Arc::new(Scheduler::new(
        pool,
        Arc::new(TaskQueue::new(QueueConfig::default())),
        plain_filter(),
        plain_engine(),
        Arc::new(executor),
        Arc::new(NullProgressSink),
        Arc::new(NullResultSink),
        Arc::new(NullErrorSink),
        SchedulerConfig::default(),
    ));

    assert!(scheduler.start(&["site:example.com".to_string()]));
    let stats = scheduler.clone().run().await;

    assert_eq!(stats.state, SchedulerState::Completed);
    assert_eq!(stats.completed_dorks, 1);
    assert!(stats.current_concurrency < SchedulerConfig::default().initial_concurrency);

    let proxy = scheduler.pool.get_by_id("p1").unwrap();
    assert_eq!(proxy.captcha_hits, 1);
}

/// A fatal engine error stops the scheduler outright instead of retrying.
#[tokio::test]
async fn fatal_error_stops_the_scheduler() {
    let executor = ScriptedExecutor::new(vec![Err(CoreError::FatalEngine("bad markup".to_string()))]);
    let scheduler = scheduler_with(executor, SchedulerConfig::default());

    assert!(scheduler.start(&["site:example.com".to_string()]));
    let stats = scheduler.clone().run().await;

    assert_eq!(stats.state, SchedulerState::Stopped);
    assert_eq!(stats.failed_dorks, 1);
}

/// `pause()` prevents further dispatch until `resume()` is called; the
/// dispatched-but-not-yet-run dork is untouched in the meantime.
#[tokio::test]
async fn pause_then_resume_still_completes() {
    let body = format!(
        "<html><body>{}</body></html>",
        r#"<a href="/url?q=https://only.example/page&amp;sa=U">only</a>"#
    );
    let executor = ScriptedExecutor::new(vec![Ok(body)]);
    let scheduler = scheduler_with(executor, SchedulerConfig::default());

    assert!(scheduler.start(&["site:example.com".to_string()]));
    scheduler.pause();
    assert_eq!(scheduler.state(), SchedulerState::Paused);
    scheduler.resume();
    assert_eq!(scheduler.state(), SchedulerState::Running);

    let stats = scheduler.clone().run().await;
    assert_eq!(stats.state, SchedulerState::Completed);
    assert_eq!(stats.completed_dorks, 1);
}

#[test]
fn eta_string_reports_complete_at_zero_pending() {
    assert_eq!(eta_string(0, 10, Duration::from_secs(60)), "Complete");
}

#[test]
fn eta_string_is_calculating_before_any_completion() {
    assert_eq!(eta_string(5, 0, Duration::from_secs(10)), "calculating");
}

#[test]
fn eta_string_formats_minutes_and_hours() {
    // 10 completed in 1 minute -> rate 10/min; 50 pending -> 5 minutes.
    assert_eq!(eta_string(50, 10, Duration::from_secs(60)), "5m");
    // 1 completed in 1 minute -> rate 1/min; 90 pending -> 90 minutes -> 1h 30m.
    assert_eq!(eta_string(90, 1, Duration::from_secs(60)), "1h 30m");
}
