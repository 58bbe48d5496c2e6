//! Proxy Pool — component A.
//!
//! Owns the full proxy set, enforces cooldowns, and serves weighted-random
//! selections.

mod parse;

#[cfg(test)]
mod tests;

pub use parse::{load_proxy_lines, parse_proxy_line, ProxyParseError};

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Upstream protocol a proxy speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
    Socks4,
    Socks5,
}

impl Protocol {
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "http" => Some(Protocol::Http),
            "https" => Some(Protocol::Https),
            "socks4" => Some(Protocol::Socks4),
            "socks5" => Some(Protocol::Socks5),
            _ => None,
        }
    }

    /// The scheme `reqwest::Proxy` expects this protocol to be addressed as.
    pub fn as_url_scheme(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
            Protocol::Socks4 => "socks4",
            Protocol::Socks5 => "socks5",
        }
    }
}

/// Network address (and optional credentials) of a proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub credentials: Option<(String, String)>,
}

/// A proxy's status bucket. Exactly one of alive/quarantined/dead/banned holds
/// at any instant, consistent with this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyStatus {
    Unknown,
    Alive,
    Slow,
    Quarantined,
    Dead,
    Banned,
}

/// The durable identity of an upstream forwarder.
#[derive(Debug, Clone)]
pub struct Proxy {
    pub id: String,
    pub endpoint: Endpoint,
    pub protocol: Protocol,
    pub status: ProxyStatus,

    pub successes: u64,
    pub failures: u64,
    pub captcha_hits: u64,
    pub ban_hits: u64,
    /// Consecutive failures since the last success or revive; drives the
    /// `MaxFailures` quarantine trigger independently of the lifetime
    /// `failures` counter, which never resets.
    consecutive_failures: u32,

    pub avg_latency_ms: f64,
    pub last_used: Option<Instant>,
    pub cooldown_until: Option<Instant>,
}

impl Proxy {
    pub fn new(id: String, endpoint: Endpoint, protocol: Protocol) -> Self {
        Self {
            id,
            endpoint,
            protocol,
            status: ProxyStatus::Alive,
            successes: 0,
            failures: 0,
            captcha_hits: 0,
            ban_hits: 0,
            consecutive_failures: 0,
            avg_latency_ms: 0.0,
            last_used: None,
            cooldown_until: None,
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.successes + self.failures
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            0.0
        } else {
            self.successes as f64 / total as f64
        }
    }

    fn is_in_cooldown(&self, now: Instant) -> bool {
        self.cooldown_until.map_or(false, |until| now < until)
    }

    fn is_selectable(&self, now: Instant) -> bool {
        self.status == ProxyStatus::Alive && !self.is_in_cooldown(now)
    }

    /// Weight used by the weighted-random draw in `ProxyPool::get`.
    fn selection_weight(&self) -> f64 {
        let base = 1.0 + 2.0 * self.success_rate();
        if self.avg_latency_ms > 5000.0 {
            base * 0.5
        } else {
            base
        }
    }
}

/// Snapshot of pool-wide counts, for observability.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PoolStats {
    pub total: usize,
    pub alive: usize,
    pub quarantined: usize,
    pub dead: usize,
    pub banned: usize,
    pub in_cooldown: usize,
}

/// Tunable knobs for the pool's state machine.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_failures: u32,
    pub cooldown: Duration,
    pub min_success_rate: f64,
    pub min_requests_for_health_check: u64,
    /// Exponential-moving-average smoothing factor for `avg_latency_ms`.
    pub latency_smoothing: f64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            cooldown: Duration::from_secs(30),
            min_success_rate: 0.5,
            min_requests_for_health_check: 10,
            latency_smoothing: 0.3,
        }
    }
}

struct PoolInner {
    proxies: Vec<Proxy>,
    ids: HashSet<String>,
}

/// Owns the full proxy set behind one lock. No lock is ever held across an
/// HTTP call — every method here returns before any I/O is issued.
pub struct ProxyPool {
    inner: Mutex<PoolInner>,
    config: PoolConfig,
}

impl ProxyPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                proxies: Vec::new(),
                ids: HashSet::new(),
            }),
            config,
        }
    }

    /// Insert a new proxy. Initial status is alive.
    pub fn add(&self, proxy: Proxy) -> Result<(), CoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.ids.insert(proxy.id.clone()) {
            return Err(CoreError::AlreadyExists(proxy.id));
        }
        inner.proxies.push(proxy);
        Ok(())
    }

    /// Bulk-add, tolerating individual `AlreadyExists` (logged by the caller
    /// via the returned count), matching the loader's "skip and continue"
    /// posture for proxy input.
    pub fn add_all(&self, proxies: Vec<Proxy>) -> usize {
        let mut added = 0;
        for proxy in proxies {
            if self.add(proxy).is_ok() {
                added += 1;
            }
        }
        added
    }

    /// Weighted-random selection among alive, off-cooldown proxies.
    ///
    /// `wᵢ = 1 + 2·sᵢ`, halved when average latency exceeds 5s. A linear scan
    /// over cumulative weights is matched against one uniform draw in
    /// `[0, total_weight)`; insertion order breaks ties, and the last
    /// candidate is returned if the scan doesn't place the draw — an
    /// acceptable floating-point rounding edge case, not a bug to guard.
    pub fn get(&self) -> Result<Proxy, CoreError> {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();

        let candidate_indices: Vec<usize> = inner
            .proxies
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_selectable(now))
            .map(|(i, _)| i)
            .collect();

        if candidate_indices.is_empty() {
            return Err(CoreError::NoAvailable);
        }

        let weights: Vec<f64> = candidate_indices
            .iter()
            .map(|&i| inner.proxies[i].selection_weight())
            .collect();
        let total: f64 = weights.iter().sum();

        let draw = if total > 0.0 {
            rand::thread_rng().gen_range(0.0..total)
        } else {
            0.0
        };

        let mut cumulative = 0.0;
        let mut chosen_idx = *candidate_indices.last().unwrap();
        for (&idx, &w) in candidate_indices.iter().zip(weights.iter()) {
            cumulative += w;
            if draw < cumulative {
                chosen_idx = idx;
                break;
            }
        }

        let proxy = &mut inner.proxies[chosen_idx];
        proxy.last_used = Some(now);
        Ok(proxy.clone())
    }

    /// Find a proxy's index by id; panics are never used — callers get `None`
    /// for an unknown id rather than an error, since report calls are best-
    /// effort feedback from in-flight requests that may race a pool mutation.
    fn find_mut<'a>(inner: &'a mut PoolInner, id: &str) -> Option<&'a mut Proxy> {
        inner.proxies.iter_mut().find(|p| p.id == id)
    }

    pub fn report_success(&self, id: &str, latency: Duration) {
        let mut inner = self.inner.lock().unwrap();
        let alpha = self.config.latency_smoothing;
        if let Some(proxy) = Self::find_mut(&mut inner, id) {
            proxy.successes += 1;
            let sample_ms = latency.as_secs_f64() * 1000.0;
            proxy.avg_latency_ms = if proxy.total_requests() == 1 {
                sample_ms
            } else {
                alpha * sample_ms + (1.0 - alpha) * proxy.avg_latency_ms
            };
            proxy.status = ProxyStatus::Alive;
            proxy.consecutive_failures = 0;
        }
    }

    pub fn report_failure(&self, id: &str) {
        let mut inner = self.inner.lock().unwrap();
        let max_failures = self.config.max_failures;
        if let Some(proxy) = Self::find_mut(&mut inner, id) {
            proxy.failures += 1;
            proxy.consecutive_failures += 1;
            if proxy.consecutive_failures >= max_failures {
                proxy.status = ProxyStatus::Quarantined;
            }
        }
    }

    pub fn report_captcha(&self, id: &str) {
        let mut inner = self.inner.lock().unwrap();
        let cooldown = self.config.cooldown;
        if let Some(proxy) = Self::find_mut(&mut inner, id) {
            proxy.captcha_hits += 1;
            proxy.cooldown_until = Some(Instant::now() + cooldown);
        }
    }

    pub fn report_block(&self, id: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(proxy) = Self::find_mut(&mut inner, id) {
            proxy.ban_hits += 1;
            proxy.status = ProxyStatus::Quarantined;
        }
    }

    /// Administrative transitions; `dead`/`banned` are terminal states
    /// entered only by explicit administrative action, never by the pool
    /// itself.
    pub fn mark_dead(&self, id: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(proxy) = Self::find_mut(&mut inner, id) {
            proxy.status = ProxyStatus::Dead;
        }
    }

    pub fn mark_banned(&self, id: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(proxy) = Self::find_mut(&mut inner, id) {
            proxy.status = ProxyStatus::Banned;
        }
    }

    pub fn revive(&self, id: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(proxy) = Self::find_mut(&mut inner, id) {
            proxy.status = ProxyStatus::Alive;
            proxy.consecutive_failures = 0;
            proxy.cooldown_until = None;
        }
    }

    /// Periodic sweep: revive quarantined proxies whose cooldown has
    /// expired, and quarantine alive proxies with sustained low success.
    pub fn perform_health_check(&self) {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        let min_requests = self.config.min_requests_for_health_check;
        let min_rate = self.config.min_success_rate;

        for proxy in inner.proxies.iter_mut() {
            if proxy.status == ProxyStatus::Quarantined && !proxy.is_in_cooldown(now) {
                proxy.status = ProxyStatus::Alive;
                proxy.consecutive_failures = 0;
                proxy.cooldown_until = None;
            } else if proxy.status == ProxyStatus::Alive
                && proxy.total_requests() >= min_requests
                && proxy.success_rate() < min_rate
            {
                proxy.status = ProxyStatus::Quarantined;
            }
        }
    }

    /// Snapshot of pool-wide counts (read-only, no mutation).
    pub fn stats(&self) -> PoolStats {
        let inner = self.inner.lock().unwrap();
        let now = Instant::now();
        let mut stats = PoolStats {
            total: inner.proxies.len(),
            ..Default::default()
        };
        for proxy in &inner.proxies {
            match proxy.status {
                ProxyStatus::Alive | ProxyStatus::Slow | ProxyStatus::Unknown => stats.alive += 1,
                ProxyStatus::Quarantined => stats.quarantined += 1,
                ProxyStatus::Dead => stats.dead += 1,
                ProxyStatus::Banned => stats.banned += 1,
            }
            if proxy.is_in_cooldown(now) {
                stats.in_cooldown += 1;
            }
        }
        stats
    }

    /// Look up a single proxy's current snapshot, for tests and diagnostics.
    pub fn get_by_id(&self, id: &str) -> Option<Proxy> {
        let inner = self.inner.lock().unwrap();
        inner.proxies.iter().find(|p| p.id == id).cloned()
    }
}
