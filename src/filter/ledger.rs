//! Domain Ledger: a durable `{domain, top_domain, first_seen, last_seen,
//! hit_count, source}` table backing only the anti-public filter step. Not
//! part of dedup.
//!
//! Connection pooling uses r2d2 + r2d2_sqlite over a single SQLite file, with
//! an upsert-on-conflict statement for the hit-count bump.

use std::path::Path;

use chrono::Utc;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

use crate::error::CoreError;

/// One row of the domain ledger.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub domain: String,
    pub top_domain: String,
    pub first_seen: chrono::DateTime<Utc>,
    pub last_seen: chrono::DateTime<Utc>,
    pub hit_count: u64,
    pub source: String,
}

/// Capability interface the filter pipeline records accepted hosts through.
/// Lets tests substitute an in-memory stub for the SQLite-backed ledger,
/// mirroring the ProgressSink/ResultSink/ErrorSink capability pattern used
/// elsewhere in the core.
pub trait LedgerSink: Send + Sync {
    fn record(&self, domain: &str, top_domain: &str, source: &str) -> Result<(), CoreError>;
}

/// Durable store recording which hosts the anti-public filter step has
/// admitted. Safe across process restarts: the insert is an upsert that
/// increments `hit_count` and refreshes `last_seen`.
pub struct DomainLedger {
    pool: Pool<SqliteConnectionManager>,
}

impl DomainLedger {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder().max_size(4).build(manager)?;

        let conn = pool.get()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS domain_ledger (
                domain TEXT PRIMARY KEY,
                top_domain TEXT NOT NULL,
                first_seen TEXT NOT NULL,
                last_seen TEXT NOT NULL,
                hit_count INTEGER NOT NULL DEFAULT 0,
                source TEXT NOT NULL
            )",
        )?;

        Ok(Self { pool })
    }

    /// In-memory ledger for tests and non-durable runs.
    pub fn open_in_memory() -> Result<Self, CoreError> {
        Self::open(":memory:")
    }

    /// Record (or re-record) that `domain`/`top_domain` was admitted, from
    /// `source`. Idempotent: repeated calls increment `hit_count`.
    pub fn record(&self, domain: &str, top_domain: &str, source: &str) -> Result<(), CoreError> {
        let conn = self.pool.get()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO domain_ledger (domain, top_domain, first_seen, last_seen, hit_count, source)
             VALUES (?1, ?2, ?3, ?3, 1, ?4)
             ON CONFLICT(domain) DO UPDATE SET
                last_seen = excluded.last_seen,
                hit_count = hit_count + 1",
            params![domain, top_domain, now, source],
        )?;
        Ok(())
    }

    pub fn get(&self, domain: &str) -> Result<Option<LedgerEntry>, CoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT domain, top_domain, first_seen, last_seen, hit_count, source
             FROM domain_ledger WHERE domain = ?1",
        )?;
        let mut rows = stmt.query_map(params![domain], |row| {
            Ok(LedgerEntry {
                domain: row.get(0)?,
                top_domain: row.get(1)?,
                first_seen: parse_rfc3339(row.get::<_, String>(2)?),
                last_seen: parse_rfc3339(row.get::<_, String>(3)?),
                hit_count: row.get::<_, i64>(4)? as u64,
                source: row.get(5)?,
            })
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn count(&self) -> Result<u64, CoreError> {
        let conn = self.pool.get()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM domain_ledger", [], |row| row.get(0))?;
        Ok(n as u64)
    }
}

fn parse_rfc3339(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_then_get_round_trips() {
        let ledger = DomainLedger::open_in_memory().unwrap();
        ledger.record("example.com", "example.com", "google").unwrap();

        let entry = ledger.get("example.com").unwrap().unwrap();
        assert_eq!(entry.top_domain, "example.com");
        assert_eq!(entry.hit_count, 1);
    }

    #[test]
    fn repeated_record_upserts_and_increments_hit_count() {
        let ledger = DomainLedger::open_in_memory().unwrap();
        ledger.record("example.com", "example.com", "google").unwrap();
        ledger.record("example.com", "example.com", "google").unwrap();
        ledger.record("example.com", "example.com", "google").unwrap();

        let entry = ledger.get("example.com").unwrap().unwrap();
        assert_eq!(entry.hit_count, 3);
        assert_eq!(ledger.count().unwrap(), 1);
    }

    #[test]
    fn unknown_domain_returns_none() {
        let ledger = DomainLedger::open_in_memory().unwrap();
        assert!(ledger.get("nope.example").unwrap().is_none());
    }
}
