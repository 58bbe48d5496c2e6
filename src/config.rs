//! Configuration, loaded in order of precedence:
//! 1. Environment variables (highest priority)
//! 2. Config file (`~/.config/dorkswarm/config.toml`)
//! 3. Built-in defaults (lowest priority)
//!
//! Two-layer pattern: an all-`Option` `FileConfig` deserialized from TOML,
//! merged against each component's own `Default` by a per-component
//! `from_file` associated function, with `AppConfig::from_env()` as the
//! single public entry point.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::EngineConfig;
use crate::filter::dedup::{DedupConfig, DedupMode};
use crate::filter::FilterConfig;
use crate::pool::PoolConfig;
use crate::queue::QueueConfig;
use crate::scheduler::SchedulerConfig;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Aggregates every component's configuration behind one load path.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub pool: PoolConfig,
    pub queue: QueueConfig,
    pub engine: EngineConfig,
    pub filter: FilterConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            queue: QueueConfig::default(),
            engine: EngineConfig::default(),
            filter: FilterConfig::default(),
            scheduler: SchedulerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────
// File configuration (deserialization layer)
// ─────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub log_level: Option<String>,
    pub pool: Option<FilePoolConfig>,
    pub queue: Option<FileQueueConfig>,
    pub engine: Option<FileEngineConfig>,
    pub filter: Option<FileFilterConfig>,
    pub scheduler: Option<FileSchedulerConfig>,
}

#[derive(Debug, Deserialize, Default)]
pub struct FilePoolConfig {
    pub max_failures: Option<u32>,
    pub cooldown_secs: Option<u64>,
    pub min_success_rate: Option<f64>,
    pub min_requests_for_health_check: Option<u64>,
    pub latency_smoothing: Option<f64>,
}

impl PoolConfig {
    pub fn from_file(file: Option<FilePoolConfig>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();
        Self {
            max_failures: file.max_failures.unwrap_or(defaults.max_failures),
            cooldown: file
                .cooldown_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.cooldown),
            min_success_rate: file.min_success_rate.unwrap_or(defaults.min_success_rate),
            min_requests_for_health_check: file
                .min_requests_for_health_check
                .unwrap_or(defaults.min_requests_for_health_check),
            latency_smoothing: file.latency_smoothing.unwrap_or(defaults.latency_smoothing),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileQueueConfig {
    pub max_retries: Option<u32>,
    pub pages_per_dork: Option<u32>,
}

impl QueueConfig {
    pub fn from_file(file: Option<FileQueueConfig>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();
        Self {
            max_retries: file.max_retries.unwrap_or(defaults.max_retries),
            pages_per_dork: file.pages_per_dork.unwrap_or(defaults.pages_per_dork),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileEngineConfig {
    pub host: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub safe_search: Option<bool>,
    pub exclude_domains: Option<Vec<String>>,
}

impl EngineConfig {
    pub fn from_file(file: Option<FileEngineConfig>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();
        Self {
            host: file.host.unwrap_or(defaults.host),
            language: file.language.unwrap_or(defaults.language),
            country: file.country.unwrap_or(defaults.country),
            safe_search: file.safe_search.unwrap_or(defaults.safe_search),
            exclude_domains: file.exclude_domains.unwrap_or(defaults.exclude_domains),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileDedupConfig {
    pub mode: Option<String>,
    pub bloom_capacity: Option<u32>,
    pub bloom_false_positive_rate: Option<f32>,
    pub exact: Option<bool>,
}

fn parse_dedup_mode(s: &str) -> Option<DedupMode> {
    match s.to_ascii_lowercase().as_str() {
        "exact" => Some(DedupMode::Exact),
        "normalized" => Some(DedupMode::Normalized),
        "domain" => Some(DedupMode::Domain),
        "top_domain" | "topdomain" => Some(DedupMode::TopDomain),
        _ => None,
    }
}

impl DedupConfig {
    pub fn from_file(file: Option<FileDedupConfig>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();
        Self {
            mode: file
                .mode
                .as_deref()
                .and_then(parse_dedup_mode)
                .unwrap_or(defaults.mode),
            bloom_capacity: file.bloom_capacity.unwrap_or(defaults.bloom_capacity),
            bloom_false_positive_rate: file
                .bloom_false_positive_rate
                .unwrap_or(defaults.bloom_false_positive_rate),
            exact: file.exact.unwrap_or(defaults.exact),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileFilterConfig {
    pub min_url_length: Option<usize>,
    pub max_url_length: Option<usize>,
    pub tld_whitelist: Option<Vec<String>>,
    pub tld_blacklist: Option<Vec<String>>,
    pub domain_whitelist: Option<Vec<String>>,
    pub domain_blacklist: Option<Vec<String>>,
    pub extension_blacklist: Option<Vec<String>>,
    pub extension_whitelist: Option<Vec<String>>,
    pub keyword_include: Option<Vec<String>>,
    pub keyword_exclude: Option<Vec<String>>,
    pub url_params_only: Option<bool>,
    pub anti_public_enabled: Option<bool>,
    pub anti_public_track: Option<bool>,
    pub dedup: Option<FileDedupConfig>,
}

impl FilterConfig {
    pub fn from_file(file: Option<FileFilterConfig>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();
        Self {
            min_url_length: file.min_url_length.unwrap_or(defaults.min_url_length),
            max_url_length: file.max_url_length.unwrap_or(defaults.max_url_length),
            tld_whitelist: file.tld_whitelist.or(defaults.tld_whitelist),
            tld_blacklist: file.tld_blacklist.or(defaults.tld_blacklist),
            domain_whitelist: file.domain_whitelist.or(defaults.domain_whitelist),
            domain_blacklist: file.domain_blacklist.or(defaults.domain_blacklist),
            extension_blacklist: file.extension_blacklist.unwrap_or(defaults.extension_blacklist),
            extension_whitelist: file.extension_whitelist.or(defaults.extension_whitelist),
            keyword_include: file.keyword_include.unwrap_or(defaults.keyword_include),
            keyword_exclude: file.keyword_exclude.unwrap_or(defaults.keyword_exclude),
            url_params_only: file.url_params_only.unwrap_or(defaults.url_params_only),
            anti_public_enabled: file.anti_public_enabled.unwrap_or(defaults.anti_public_enabled),
            anti_public_track: file.anti_public_track.unwrap_or(defaults.anti_public_track),
            dedup: DedupConfig::from_file(file.dedup),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileSchedulerConfig {
    pub min_concurrency: Option<usize>,
    pub max_concurrency: Option<usize>,
    pub initial_concurrency: Option<usize>,
    pub target_success_rate: Option<f64>,
    pub concurrency_step_up: Option<usize>,
    pub concurrency_step_down: Option<usize>,
    pub outcome_window: Option<usize>,
    pub results_per_page: Option<u32>,
    pub request_timeout_secs: Option<u64>,
    pub health_check_interval_secs: Option<u64>,
}

impl SchedulerConfig {
    pub fn from_file(file: Option<FileSchedulerConfig>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();
        Self {
            min_concurrency: file.min_concurrency.unwrap_or(defaults.min_concurrency),
            max_concurrency: file.max_concurrency.unwrap_or(defaults.max_concurrency),
            initial_concurrency: file.initial_concurrency.unwrap_or(defaults.initial_concurrency),
            target_success_rate: file.target_success_rate.unwrap_or(defaults.target_success_rate),
            concurrency_step_up: file.concurrency_step_up.unwrap_or(defaults.concurrency_step_up),
            concurrency_step_down: file
                .concurrency_step_down
                .unwrap_or(defaults.concurrency_step_down),
            outcome_window: file.outcome_window.unwrap_or(defaults.outcome_window),
            results_per_page: file.results_per_page.unwrap_or(defaults.results_per_page),
            request_timeout: file
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            health_check_interval: file
                .health_check_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.health_check_interval),
            ..defaults
        }
    }
}

impl AppConfig {
    /// `~/.config/dorkswarm/config.toml`.
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join("dorkswarm").join("config.toml"))
    }

    fn load_file_config(path: Option<PathBuf>) -> FileConfig {
        let Some(path) = path.or_else(Self::config_path) else {
            return FileConfig::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                eprintln!("config error: failed to parse {}: {e}", path.display());
                std::process::exit(1);
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileConfig::default(),
            Err(e) => {
                eprintln!("config error: cannot read {}: {e}", path.display());
                std::process::exit(1);
            }
        }
    }

    /// Load configuration: env > file > default, reading the config file
    /// from `~/.config/dorkswarm/config.toml`.
    pub fn from_env() -> Self {
        Self::from_env_with_path(None)
    }

    /// Same as `from_env`, but reads the config file from `path` when given
    /// (the CLI's `--config` flag) instead of the default location.
    pub fn from_env_with_path(path: Option<PathBuf>) -> Self {
        let file = Self::load_file_config(path);

        let log_level = std::env::var("DORKSWARM_LOG_LEVEL")
            .ok()
            .or(file.log_level)
            .unwrap_or_else(|| LoggingConfig::default().level);

        let mut scheduler = SchedulerConfig::from_file(file.scheduler);
        if let Ok(v) = std::env::var("DORKSWARM_MAX_CONCURRENCY") {
            if let Ok(n) = v.parse() {
                scheduler.max_concurrency = n;
            }
        }

        Self {
            pool: PoolConfig::from_file(file.pool),
            queue: QueueConfig::from_file(file.queue),
            engine: EngineConfig::from_file(file.engine),
            filter: FilterConfig::from_file(file.filter),
            scheduler,
            logging: LoggingConfig { level: log_level },
        }
    }
}
