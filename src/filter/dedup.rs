//! Deduplication strategy: a Bloom-style approximate filter always runs
//! first, with an optional exact keyset consulted ahead of it when `exact`
//! mode is requested.

use std::collections::HashSet;

use bloom::{BloomFilter, ASMS};
use url::Url;

use super::tld::registrable_domain;
use crate::engine::normalize;

/// Which string is hashed into the dedup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupMode {
    Exact,
    Normalized,
    Domain,
    TopDomain,
}

#[derive(Debug, Clone, Copy)]
pub struct DedupConfig {
    pub mode: DedupMode,
    pub bloom_capacity: u32,
    pub bloom_false_positive_rate: f32,
    pub exact: bool,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            mode: DedupMode::Normalized,
            bloom_capacity: 1_000_000,
            bloom_false_positive_rate: 0.01,
            exact: false,
        }
    }
}

/// Compute the dedup key for `url` (already known-parseable) under `mode`.
pub fn dedup_key(url: &Url, mode: DedupMode) -> String {
    match mode {
        DedupMode::Exact => url.as_str().to_string(),
        DedupMode::Normalized => normalize(url),
        DedupMode::Domain => url.host_str().unwrap_or_default().to_ascii_lowercase(),
        DedupMode::TopDomain => {
            registrable_domain(&url.host_str().unwrap_or_default().to_ascii_lowercase())
        }
    }
}

/// Bloom filter plus optional exact fallback keyset, per the configured mode.
pub struct Deduplicator {
    mode: DedupMode,
    bloom: BloomFilter,
    exact: Option<HashSet<String>>,
}

impl Deduplicator {
    pub fn new(config: DedupConfig) -> Self {
        Self {
            mode: config.mode,
            bloom: BloomFilter::with_rate(config.bloom_false_positive_rate, config.bloom_capacity),
            exact: config.exact.then(HashSet::new),
        }
    }

    /// Returns `true` if `key` has not been seen before, recording it as
    /// seen as a side effect. The exact set (if enabled) is consulted first
    /// so a confirmed-seen key never falls through to the probabilistic
    /// check.
    pub fn check_and_insert(&mut self, url: &Url) -> bool {
        let key = dedup_key(url, self.mode);

        if let Some(exact) = &mut self.exact {
            if exact.contains(&key) {
                return false;
            }
            exact.insert(key.clone());
        }

        if self.bloom.contains(&key) {
            return false;
        }
        self.bloom.insert(&key);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn exact_mode_distinguishes_by_full_url() {
        let mut d = Deduplicator::new(DedupConfig {
            mode: DedupMode::Exact,
            exact: true,
            ..Default::default()
        });
        assert!(d.check_and_insert(&u("https://example.com/a?x=1")));
        assert!(d.check_and_insert(&u("https://example.com/a?x=2")));
        assert!(!d.check_and_insert(&u("https://example.com/a?x=1")));
    }

    #[test]
    fn normalized_mode_collapses_tracking_param_variants() {
        let mut d = Deduplicator::new(DedupConfig {
            mode: DedupMode::Normalized,
            exact: true,
            ..Default::default()
        });
        assert!(d.check_and_insert(&u("https://example.com/a")));
        assert!(!d.check_and_insert(&u("https://example.com/a?utm_source=x")));
    }

    #[test]
    fn domain_mode_collapses_by_host() {
        let mut d = Deduplicator::new(DedupConfig {
            mode: DedupMode::Domain,
            exact: true,
            ..Default::default()
        });
        assert!(d.check_and_insert(&u("https://example.com/a")));
        assert!(!d.check_and_insert(&u("https://example.com/b")));
    }

    #[test]
    fn top_domain_mode_collapses_across_subdomains() {
        let mut d = Deduplicator::new(DedupConfig {
            mode: DedupMode::TopDomain,
            exact: true,
            ..Default::default()
        });
        assert!(d.check_and_insert(&u("https://www.example.com/a")));
        assert!(!d.check_and_insert(&u("https://blog.example.com/b")));
    }

    #[test]
    fn without_exact_set_bloom_alone_drives_membership() {
        let mut d = Deduplicator::new(DedupConfig {
            exact: false,
            ..Default::default()
        });
        assert!(d.check_and_insert(&u("https://example.com/a")));
        assert!(!d.check_and_insert(&u("https://example.com/a")));
    }
}
