//! Headless runner: parse flags, load config,
//! wire up `Core`, load proxies/dorks, run the scheduler to completion or
//! until Ctrl+C, print a final `Stats` snapshot.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use dorkswarm_core::cli::Cli;
use dorkswarm_core::config::AppConfig;
use dorkswarm_core::core::Core;
use dorkswarm_core::filter::PublicDomainSet;
use dorkswarm_core::http::ReqwestExecutor;
use dorkswarm_core::logging;
use dorkswarm_core::sinks::{NullErrorSink, NullResultSink, StdoutProgressSink};
use dorkswarm_core::{dork, scheduler};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::from_env_with_path(cli.config.clone());
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(max) = cli.max_concurrency {
        config.scheduler.max_concurrency = max;
    }
    logging::init(&config.logging.level);

    let scheduler_config = config.scheduler.clone();
    let core = Core::new(config, PublicDomainSet::default()).with_sinks(
        scheduler_config,
        Arc::new(ReqwestExecutor::new()),
        Arc::new(StdoutProgressSink),
        Arc::new(NullResultSink),
        Arc::new(NullErrorSink),
    );

    let proxies_text = std::fs::read_to_string(&cli.proxies)
        .with_context(|| format!("reading proxy file {}", cli.proxies.display()))?;
    let (added, parse_errors) = core.load_proxies(&proxies_text);
    tracing::info!(added, errors = parse_errors.len(), "loaded proxies");
    for e in &parse_errors {
        tracing::warn!(%e, "skipped unparseable proxy line");
    }

    let dorks_text = std::fs::read_to_string(&cli.dorks)
        .with_context(|| format!("reading dork file {}", cli.dorks.display()))?;
    let dorks = dork::load_dork_lines(&dorks_text);
    tracing::info!(count = dorks.len(), "loaded dorks");

    if !core.scheduler.start(&dorks) {
        anyhow::bail!("scheduler could not start (already running)");
    }

    let scheduler = Arc::clone(&core.scheduler);
    let mut run_handle = tokio::spawn(async move { scheduler.run().await });

    let stats = tokio::select! {
        result = &mut run_handle => result.context("scheduler task panicked")?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received, stopping");
            core.scheduler.stop();
            run_handle.await.context("scheduler task panicked")?
        }
    };

    print_final(&stats);
    Ok(())
}

fn print_final(stats: &scheduler::Stats) {
    println!(
        "done: state={} completed={} failed={} unique_urls={} captcha={} blocked={}",
        stats.state_label(),
        stats.completed_dorks,
        stats.failed_dorks,
        stats.unique_urls,
        stats.captcha_count,
        stats.block_count,
    );
}
