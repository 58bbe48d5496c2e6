//! Composition root. `Core` wires Pool/Queue/Filter/Engine into
//! a `Scheduler`; nothing here is a `static`/`OnceLock`.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::engine::EngineAdapter;
use crate::error::CoreError;
use crate::filter::ledger::LedgerSink;
use crate::filter::{FilterPipeline, PublicDomainSet};
use crate::http::{ReqwestExecutor, RequestExecutor};
use crate::pool::ProxyPool;
use crate::queue::TaskQueue;
use crate::scheduler::Scheduler;
use crate::sinks::{ErrorSink, NullErrorSink, NullProgressSink, NullResultSink, ProgressSink, ResultSink};

/// Owns the five components and the scheduler built from them. Construction
/// never fails on its own; a ledger, if requested, is opened separately so
/// callers can surface that I/O error distinctly from configuration parsing.
pub struct Core {
    pub pool: Arc<ProxyPool>,
    pub queue: Arc<TaskQueue>,
    pub filter: Arc<FilterPipeline>,
    pub engine: EngineAdapter,
    pub scheduler: Arc<Scheduler>,
}

impl Core {
    /// Wire the five components per `config`, using the default in-process
    /// sinks and `ReqwestExecutor` for outbound HTTP. Call `with_sinks`
    /// afterwards when an embedder needs a different sink or executor.
    pub fn new(config: AppConfig, public_domains: PublicDomainSet) -> Self {
        Self::with_ledger(config, public_domains, None)
    }

    pub fn with_ledger(
        config: AppConfig,
        public_domains: PublicDomainSet,
        ledger: Option<Box<dyn LedgerSink>>,
    ) -> Self {
        let pool = Arc::new(ProxyPool::new(config.pool));
        let queue = Arc::new(TaskQueue::new(config.queue));
        let engine = EngineAdapter::new(config.engine);

        let mut filter = FilterPipeline::new(config.filter, public_domains);
        if let Some(ledger) = ledger {
            filter = filter.with_ledger(ledger);
        }
        let filter = Arc::new(filter);

        let executor: Arc<dyn RequestExecutor> = Arc::new(ReqwestExecutor::new());
        let progress: Arc<dyn ProgressSink> = Arc::new(NullProgressSink);
        let results: Arc<dyn ResultSink> = Arc::new(NullResultSink);
        let errors: Arc<dyn ErrorSink> = Arc::new(NullErrorSink);

        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&pool),
            Arc::clone(&queue),
            Arc::clone(&filter),
            engine.clone(),
            executor,
            progress,
            results,
            errors,
            config.scheduler,
        ));

        Self {
            pool,
            queue,
            filter,
            engine,
            scheduler,
        }
    }

    /// Swap in the sinks an embedder actually wants, rebuilding the
    /// scheduler around the same pool/queue/filter/engine. Used by
    /// `main.rs` to plug in `StdoutProgressSink`.
    pub fn with_sinks(
        mut self,
        scheduler_config: crate::scheduler::SchedulerConfig,
        executor: Arc<dyn RequestExecutor>,
        progress: Arc<dyn ProgressSink>,
        results: Arc<dyn ResultSink>,
        errors: Arc<dyn ErrorSink>,
    ) -> Self {
        self.scheduler = Arc::new(Scheduler::new(
            Arc::clone(&self.pool),
            Arc::clone(&self.queue),
            Arc::clone(&self.filter),
            self.engine.clone(),
            executor,
            progress,
            results,
            errors,
            scheduler_config,
        ));
        self
    }

    /// Load proxies from line-oriented text, adding each successfully parsed
    /// entry to the pool. Returns the number added alongside any lines that
    /// failed to parse — loading is best-effort, not all-or-nothing.
    pub fn load_proxies(&self, text: &str) -> (usize, Vec<CoreError>) {
        let (proxies, errors) = crate::pool::load_proxy_lines(text);
        let added = self.pool.add_all(proxies);
        (added, errors.into_iter().map(Into::into).collect())
    }
}

impl From<crate::pool::ProxyParseError> for CoreError {
    fn from(e: crate::pool::ProxyParseError) -> Self {
        CoreError::ParseInput {
            line_no: e.line_no,
            reason: e.reason,
        }
    }
}

