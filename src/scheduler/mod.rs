//! Scheduler. Owns the control loop that turns pending tasks into requests
//! and outcomes, and drives adaptive concurrency. Binds the proxy pool, task
//! queue, filter pipeline, and engine adapter together; this is the only
//! module that knows about all four of them at once. Wiring them together
//! happens in `Core`, not in a singleton here.

pub mod outcome;

#[cfg(test)]
mod tests;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::engine::EngineAdapter;
use crate::error::CoreError;
use crate::filter::FilterPipeline;
use crate::http::RequestExecutor;
use crate::pool::ProxyPool;
use crate::queue::{Priority, TaskQueue};
use crate::sinks::{ErrorSink, ProgressSink, ResultSink};

use outcome::Outcome;

/// Scheduler state machine. `Paused` is reachable only from
/// `Running` and returns only to `Running`; every other transition is
/// linear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Paused,
    Stopping,
    Stopped,
    Completed,
}

impl SchedulerState {
    fn label(&self) -> &'static str {
        match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Running => "running",
            SchedulerState::Paused => "paused",
            SchedulerState::Stopping => "stopping",
            SchedulerState::Stopped => "stopped",
            SchedulerState::Completed => "completed",
        }
    }
}

/// Tunable knobs for the control loop and adaptive concurrency.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub min_concurrency: usize,
    pub max_concurrency: usize,
    pub initial_concurrency: usize,
    /// Recent-outcome success rate above which the adaptive logic grows
    /// `currentConcurrency`. 85% is the crate's chosen default target.
    pub target_success_rate: f64,
    pub concurrency_step_up: usize,
    pub concurrency_step_down: usize,
    pub outcome_window: usize,
    pub results_per_page: u32,
    pub request_timeout: Duration,
    pub dispatch_delay_busy: Duration,
    pub dispatch_delay_idle: Duration,
    /// How often the background sweep calls `ProxyPool::perform_health_check`
    /// (spec.md §4.5's "periodic health-check sleep" suspension point).
    pub health_check_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_concurrency: 10,
            max_concurrency: 200,
            initial_concurrency: 50,
            target_success_rate: 0.85,
            concurrency_step_up: 5,
            concurrency_step_down: 10,
            outcome_window: 100,
            results_per_page: 10,
            request_timeout: Duration::from_secs(15),
            dispatch_delay_busy: Duration::from_millis(50),
            dispatch_delay_idle: Duration::from_millis(100),
            health_check_interval: Duration::from_secs(30),
        }
    }
}

/// Pull-model observability snapshot.
#[derive(Debug, Clone)]
pub struct Stats {
    pub state: SchedulerState,
    pub total_dorks: usize,
    pub completed_dorks: usize,
    pub failed_dorks: usize,
    pub pending_dorks: usize,
    pub running_tasks: usize,
    pub total_urls: u64,
    pub unique_urls: u64,
    pub requests_per_min: f64,
    pub urls_per_min: f64,
    pub success_rate: f64,
    pub eta: String,
    pub current_concurrency: usize,
    pub captcha_count: u64,
    pub block_count: u64,
}

impl Stats {
    pub fn state_label(&self) -> &'static str {
        self.state.label()
    }
}

/// `(dork, page)` keyed so `execute_task` can report outcomes against the
/// originating dork (the queue tracks retry/priority state on `Task` itself;
/// the scheduler only needs enough to build the request and report back).
struct Dispatched {
    id: u64,
    dork: String,
    page: u32,
}

/// Adaptive-concurrency control loop binding Pool/Queue/Filter/Engine
/// together.
pub struct Scheduler {
    pool: Arc<ProxyPool>,
    queue: Arc<TaskQueue>,
    filter: Arc<FilterPipeline>,
    engine: EngineAdapter,
    executor: Arc<dyn RequestExecutor>,
    progress_sink: Arc<dyn ProgressSink>,
    result_sink: Arc<dyn ResultSink>,
    error_sink: Arc<dyn ErrorSink>,
    config: SchedulerConfig,

    state: Mutex<SchedulerState>,
    current_concurrency: AtomicUsize,
    inflight: AtomicUsize,
    recent_outcomes: Mutex<VecDeque<bool>>,

    total_dorks: AtomicUsize,
    total_urls: AtomicU64,
    unique_urls: AtomicU64,
    captcha_count: AtomicU64,
    block_count: AtomicU64,

    started_at: Mutex<Option<Instant>>,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: Arc<ProxyPool>,
        queue: Arc<TaskQueue>,
        filter: Arc<FilterPipeline>,
        engine: EngineAdapter,
        executor: Arc<dyn RequestExecutor>,
        progress_sink: Arc<dyn ProgressSink>,
        result_sink: Arc<dyn ResultSink>,
        error_sink: Arc<dyn ErrorSink>,
        config: SchedulerConfig,
    ) -> Self {
        let initial_concurrency = config.initial_concurrency;
        Self {
            pool,
            queue,
            filter,
            engine,
            executor,
            progress_sink,
            result_sink,
            error_sink,
            config,
            state: Mutex::new(SchedulerState::Idle),
            current_concurrency: AtomicUsize::new(initial_concurrency),
            inflight: AtomicUsize::new(0),
            recent_outcomes: Mutex::new(VecDeque::new()),
            total_dorks: AtomicUsize::new(0),
            total_urls: AtomicU64::new(0),
            unique_urls: AtomicU64::new(0),
            captcha_count: AtomicU64::new(0),
            block_count: AtomicU64::new(0),
            started_at: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock().unwrap()
    }

    /// Ingest `dorks` as page-0 tasks and transition to running. Legal from
    /// idle, stopped, or completed; a no-op (returns `false`)
    /// otherwise. Historical pool/ledger counters are never reset here —
    /// only this scheduler's own transient counters are (DESIGN.md open
    /// question #4).
    pub fn start(&self, dorks: &[String]) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            if !matches!(
                *state,
                SchedulerState::Idle | SchedulerState::Stopped | SchedulerState::Completed
            ) {
                return false;
            }
            *state = SchedulerState::Running;
        }
        *self.started_at.lock().unwrap() = Some(Instant::now());
        self.total_dorks.fetch_add(dorks.len(), Ordering::SeqCst);
        self.total_urls.store(0, Ordering::SeqCst);
        self.unique_urls.store(0, Ordering::SeqCst);
        self.captcha_count.store(0, Ordering::SeqCst);
        self.block_count.store(0, Ordering::SeqCst);
        self.recent_outcomes.lock().unwrap().clear();
        self.current_concurrency
            .store(self.config.initial_concurrency, Ordering::SeqCst);
        for dork in dorks {
            self.queue.add_dork(dork, Priority::Normal);
        }
        true
    }

    /// Suspend dispatch without touching in-flight work.
    pub fn pause(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == SchedulerState::Running {
            *state = SchedulerState::Paused;
            self.queue.pause();
        }
    }

    pub fn resume(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == SchedulerState::Paused {
            *state = SchedulerState::Running;
            self.queue.resume();
        }
    }

    /// Cancel further dispatch and drain in-flight work best-effort.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        if matches!(*state, SchedulerState::Running | SchedulerState::Paused) {
            *state = SchedulerState::Stopping;
            self.queue.pause();
        }
    }

    pub fn stats(&self) -> Stats {
        let state = self.state();
        let qstats = self.queue.stats();
        let elapsed = self
            .started_at
            .lock()
            .unwrap()
            .map(|t| t.elapsed())
            .unwrap_or_default();
        let elapsed_min = elapsed.as_secs_f64() / 60.0;

        let requests_per_min = if elapsed_min > 0.0 {
            (qstats.completed + qstats.failed) as f64 / elapsed_min
        } else {
            0.0
        };
        let urls_per_min = if elapsed_min > 0.0 {
            self.unique_urls.load(Ordering::SeqCst) as f64 / elapsed_min
        } else {
            0.0
        };

        Stats {
            state,
            total_dorks: self.total_dorks.load(Ordering::SeqCst),
            completed_dorks: qstats.completed,
            failed_dorks: qstats.failed,
            pending_dorks: qstats.pending,
            running_tasks: qstats.running,
            total_urls: self.total_urls.load(Ordering::SeqCst),
            unique_urls: self.unique_urls.load(Ordering::SeqCst),
            requests_per_min,
            urls_per_min,
            success_rate: self.recent_success_rate(),
            eta: eta_string(qstats.pending, qstats.completed, elapsed),
            current_concurrency: self.current_concurrency.load(Ordering::SeqCst),
            captcha_count: self.captcha_count.load(Ordering::SeqCst),
            block_count: self.block_count.load(Ordering::SeqCst),
        }
    }

    fn recent_success_rate(&self) -> f64 {
        let ring = self.recent_outcomes.lock().unwrap();
        if ring.is_empty() {
            return 0.0;
        }
        let successes = ring.iter().filter(|&&ok| ok).count();
        successes as f64 / ring.len() as f64
    }

    fn record_outcome(&self, success: bool) {
        let mut ring = self.recent_outcomes.lock().unwrap();
        ring.push_back(success);
        while ring.len() > self.config.outcome_window {
            ring.pop_front();
        }
    }

    fn grow_concurrency(&self) {
        let step = self.config.concurrency_step_up;
        let max = self.config.max_concurrency;
        self.current_concurrency
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| Some((c + step).min(max)))
            .ok();
    }

    fn shrink_concurrency(&self) {
        let step = self.config.concurrency_step_down;
        let min = self.config.min_concurrency;
        self.current_concurrency
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| {
                Some(c.saturating_sub(step).max(min))
            })
            .ok();
    }

    /// Runs the control loop to completion, alongside a background
    /// health-check sweep. Consumes `self: Arc<Self>` so spawned request
    /// operations can report their outcome back through a cheap `Arc` clone
    /// — no cyclic scheduler<->queue references.
    pub async fn run(self: Arc<Self>) -> Stats {
        let health_check = {
            let pool = Arc::clone(&self.pool);
            let interval = self.config.health_check_interval;
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(interval).await;
                    pool.perform_health_check();
                }
            })
        };

        let stats = self.run_control_loop().await;
        health_check.abort();
        stats
    }

    /// The dispatch/outcome loop proper; split out of `run` so the
    /// health-check sweep's own task can be cleanly aborted once this
    /// returns, rather than racing it against a `break` inside one `loop`.
    async fn run_control_loop(self: Arc<Self>) -> Stats {
        loop {
            match self.state() {
                SchedulerState::Running => {
                    let inflight = self.inflight.load(Ordering::SeqCst);
                    let cap = self.current_concurrency.load(Ordering::SeqCst);
                    let available = cap.saturating_sub(inflight);

                    let mut dispatched_any = false;
                    if available > 0 {
                        let batch = self.queue.next_batch(available);
                        for task in batch {
                            dispatched_any = true;
                            self.inflight.fetch_add(1, Ordering::SeqCst);
                            let scheduler = Arc::clone(&self);
                            let dispatched = Dispatched {
                                id: task.id,
                                dork: task.dork,
                                page: task.page,
                            };
                            tokio::spawn(async move {
                                scheduler.execute_task(dispatched).await;
                            });
                        }
                    }

                    let qstats = self.queue.stats();
                    if !dispatched_any && qstats.is_drained() && self.inflight.load(Ordering::SeqCst) == 0 {
                        *self.state.lock().unwrap() = SchedulerState::Completed;
                        self.progress_sink.on_progress(&self.stats());
                        break;
                    }

                    self.progress_sink.on_progress(&self.stats());
                    let delay = if dispatched_any {
                        self.config.dispatch_delay_busy
                    } else {
                        self.config.dispatch_delay_idle
                    };
                    tokio::time::sleep(delay).await;
                }
                SchedulerState::Paused => {
                    tokio::time::sleep(self.config.dispatch_delay_idle).await;
                }
                SchedulerState::Stopping => {
                    if self.inflight.load(Ordering::SeqCst) == 0 {
                        *self.state.lock().unwrap() = SchedulerState::Stopped;
                        break;
                    }
                    tokio::time::sleep(self.config.dispatch_delay_idle).await;
                }
                SchedulerState::Idle | SchedulerState::Stopped | SchedulerState::Completed => break,
            }
        }
        self.stats()
    }

    /// Acquire a proxy, perform the request, classify, and apply the
    /// resulting outcome. Runs as its own spawned task; the only suspension
    /// point inside is the HTTP call.
    async fn execute_task(&self, task: Dispatched) {
        let proxy = match self.pool.get() {
            Ok(p) => p,
            Err(CoreError::NoAvailable) => {
                // No proxy currently available: modeled as an immediate
                // retry-eligible requeue rather than a distinct non-counted
                // path, since the queue has no notion of "didn't really try
                // yet".
                self.queue.fail(task.id, "no proxy available", true);
                self.inflight.fetch_sub(1, Ordering::SeqCst);
                return;
            }
            Err(_) => unreachable!("ProxyPool::get only returns NoAvailable"),
        };

        let url = self
            .engine
            .build_url(&task.dork, task.page, self.config.results_per_page);

        let outcome = match self
            .executor
            .execute(&url, proxy.protocol, &proxy.endpoint, self.config.request_timeout)
            .await
        {
            Ok(fetch) => {
                let classification = self.engine.classify_response(&fetch.body);
                let urls = self.engine.extract_urls(&fetch.body);
                let has_next_page = !urls.is_empty() && urls.len() as u32 >= self.config.results_per_page;
                Outcome::from_classification(classification, urls, fetch.latency, has_next_page)
            }
            Err(e) => {
                self.error_sink.on_error(&e.to_string());
                Outcome::from_error(&e)
            }
        };

        self.apply_outcome(&task, &proxy.id, outcome);
        self.inflight.fetch_sub(1, Ordering::SeqCst);
    }

    fn apply_outcome(&self, task: &Dispatched, proxy_id: &str, outcome: Outcome) {
        self.record_outcome(outcome.counts_as_success());

        match outcome {
            Outcome::Success {
                urls,
                has_next_page,
                latency,
            } => {
                self.pool.report_success(proxy_id, latency);
                self.total_urls.fetch_add(urls.len() as u64, Ordering::SeqCst);

                let raw: Vec<String> = urls.into_iter().map(|u| u.url).collect();
                let accepted = self.filter.filter(&raw);
                self.unique_urls.fetch_add(accepted.len() as u64, Ordering::SeqCst);
                for record in &accepted {
                    self.result_sink.on_result(&task.dork, record);
                }

                self.queue.complete(task.id, raw, has_next_page);

                if self.recent_success_rate() >= self.config.target_success_rate + 0.05 {
                    self.grow_concurrency();
                }
            }
            Outcome::Empty { latency } => {
                self.pool.report_success(proxy_id, latency);
                self.queue.complete(task.id, Vec::new(), false);

                if self.recent_success_rate() >= self.config.target_success_rate + 0.05 {
                    self.grow_concurrency();
                }
            }
            Outcome::Captcha => {
                self.pool.report_captcha(proxy_id);
                self.captcha_count.fetch_add(1, Ordering::SeqCst);
                self.queue.block(task.id, "captcha");
                self.shrink_concurrency();
            }
            Outcome::Blocked => {
                self.pool.report_block(proxy_id);
                self.block_count.fetch_add(1, Ordering::SeqCst);
                self.queue.block(task.id, "blocked");
                self.shrink_concurrency();
            }
            Outcome::Transport | Outcome::Timeout => {
                self.pool.report_failure(proxy_id);
                self.queue.fail(task.id, "transport error", true);
            }
            Outcome::Fatal(msg) => {
                self.queue.fail(task.id, msg.clone(), false);
                self.error_sink.on_error(&format!("fatal engine error: {msg}"));
                self.stop();
            }
        }
    }
}

/// ETA rendering: "Xh Ym" above an hour, "Xm" below, "Complete" at zero
/// pending.
fn eta_string(pending: usize, completed: usize, elapsed: Duration) -> String {
    if pending == 0 {
        return "Complete".to_string();
    }
    let elapsed_min = elapsed.as_secs_f64() / 60.0;
    if completed == 0 || elapsed_min <= 0.0 {
        return "calculating".to_string();
    }
    let rate_per_min = completed as f64 / elapsed_min;
    if rate_per_min <= 0.0 {
        return "calculating".to_string();
    }
    let eta_minutes = pending as f64 / rate_per_min;
    if eta_minutes >= 60.0 {
        let hours = (eta_minutes / 60.0).floor() as u64;
        let mins = (eta_minutes % 60.0).round() as u64;
        format!("{hours}h {mins}m")
    } else {
        format!("{}m", eta_minutes.ceil().max(1.0) as u64)
    }
}
