//! SQLite implementation of the persistent price store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use riskdesk_core::{
    AnalysisResult, DateRange, PriceBar, PriceSeries, PriceStore, SeriesLookup, StoreError,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS price_bars (
    symbol   TEXT NOT NULL,
    date     TEXT NOT NULL,
    open     REAL NOT NULL,
    high     REAL NOT NULL,
    low      REAL NOT NULL,
    close    REAL NOT NULL,
    volume   INTEGER NOT NULL,
    PRIMARY KEY (symbol, date)
);
CREATE TABLE IF NOT EXISTS series_coverage (
    id         INTEGER PRIMARY KEY,
    symbol     TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date   TEXT NOT NULL,
    fetched_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_coverage_symbol ON series_coverage (symbol);
CREATE TABLE IF NOT EXISTS analysis_cache (
    key         TEXT PRIMARY KEY,
    symbols     TEXT NOT NULL,
    payload     TEXT NOT NULL,
    computed_at TEXT NOT NULL
);
";

/// Durable store over a single SQLite connection.
///
/// The connection mutex is only ever held for local queries; network
/// round trips happen in the orchestrator with no store lock held.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(backend)?;
        Self::init(conn)
    }

    /// Open an ephemeral in-memory store. Used by tests and ad-hoc runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(backend)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A poisoned connection mutex means a writer panicked mid-query;
        // SQLite transactions keep the file consistent, so recover.
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Coverage windows for a symbol, sorted by start, non-overlapping.
    fn coverage(
        conn: &Connection,
        symbol: &str,
    ) -> Result<Vec<(DateRange, DateTime<Utc>)>, StoreError> {
        let mut stmt = conn
            .prepare(
                "SELECT start_date, end_date, fetched_at FROM series_coverage
                 WHERE symbol = ?1 ORDER BY start_date",
            )
            .map_err(backend)?;
        let rows = stmt
            .query_map(params![symbol], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .map_err(backend)?;

        let mut windows = Vec::new();
        for row in rows {
            let (start, end, fetched_at): (chrono::NaiveDate, chrono::NaiveDate, DateTime<Utc>) =
                row.map_err(backend)?;
            let range = DateRange::new(start, end)
                .map_err(|e| StoreError::Corrupt(format!("coverage window for {}: {}", symbol, e)))?;
            windows.push((range, fetched_at));
        }
        Ok(windows)
    }
}

#[async_trait]
impl PriceStore for SqliteStore {
    async fn get_series(
        &self,
        symbol: &str,
        range: &DateRange,
    ) -> Result<SeriesLookup, StoreError> {
        let conn = self.lock();

        let windows = Self::coverage(&conn, symbol)?;
        let hit: Vec<(DateRange, DateTime<Utc>)> = windows
            .into_iter()
            .filter(|(w, _)| w.intersect(range).is_some())
            .collect();
        if hit.is_empty() {
            return Ok(SeriesLookup::Miss);
        }

        // The stalest contributing window governs the freshness decision.
        let Some(fetched_at) = hit.iter().map(|(_, at)| *at).min() else {
            return Ok(SeriesLookup::Miss);
        };
        let covered: Vec<DateRange> = hit.iter().map(|(w, _)| *w).collect();
        let gaps = range.subtract(&covered);

        let mut stmt = conn
            .prepare(
                "SELECT date, open, high, low, close, volume FROM price_bars
                 WHERE symbol = ?1 AND date >= ?2 AND date <= ?3 ORDER BY date",
            )
            .map_err(backend)?;
        let rows = stmt
            .query_map(params![symbol, range.start, range.end], |row| {
                Ok(PriceBar {
                    symbol: symbol.to_string(),
                    date: row.get(0)?,
                    open: row.get(1)?,
                    high: row.get(2)?,
                    low: row.get(3)?,
                    close: row.get(4)?,
                    volume: row.get::<_, i64>(5)? as u64,
                })
            })
            .map_err(backend)?;

        let mut bars = Vec::new();
        for row in rows {
            bars.push(row.map_err(backend)?);
        }
        let series = PriceSeries::from_bars(symbol, bars);

        if gaps.is_empty() {
            Ok(SeriesLookup::Hit { series, fetched_at })
        } else {
            debug!(symbol, ?gaps, "partial store hit");
            Ok(SeriesLookup::Partial {
                series,
                fetched_at,
                gaps,
            })
        }
    }

    async fn put_series(
        &self,
        series: &PriceSeries,
        covered: &DateRange,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(backend)?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO price_bars
                     (symbol, date, open, high, low, close, volume)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(backend)?;
            for bar in series.bars() {
                stmt.execute(params![
                    bar.symbol,
                    bar.date,
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume as i64,
                ])
                .map_err(backend)?;
            }
        }

        // Fold the satisfied range into the coverage set, merging any
        // windows it overlaps or touches. The merged window carries the
        // newest fetch time of its members.
        let windows = Self::coverage(&tx, &series.symbol)?;
        let mut merged = *covered;
        let mut merged_at = now;
        let mut keep = Vec::new();
        for (window, at) in windows {
            if merged.touches(&window) {
                merged = merged.merge(&window);
                merged_at = merged_at.max(at);
            } else {
                keep.push((window, at));
            }
        }
        keep.push((merged, merged_at));

        tx.execute(
            "DELETE FROM series_coverage WHERE symbol = ?1",
            params![series.symbol],
        )
        .map_err(backend)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO series_coverage (symbol, start_date, end_date, fetched_at)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(backend)?;
            for (window, at) in keep {
                stmt.execute(params![series.symbol, window.start, window.end, at])
                    .map_err(backend)?;
            }
        }

        tx.commit().map_err(backend)
    }

    async fn last_series_write(
        &self,
        symbol: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let conn = self.lock();
        let windows = Self::coverage(&conn, symbol)?;
        Ok(windows.into_iter().map(|(_, at)| at).max())
    }

    async fn get_analysis(&self, key: &str) -> Result<Option<AnalysisResult>, StoreError> {
        let conn = self.lock();
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM analysis_cache WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend)?;

        payload
            .map(|json| {
                serde_json::from_str(&json)
                    .map_err(|e| StoreError::Corrupt(format!("analysis row {}: {}", key, e)))
            })
            .transpose()
    }

    async fn put_analysis(
        &self,
        result: &AnalysisResult,
        symbols: &[String],
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_string(result)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        // Delimited form so symbol invalidation can match exactly.
        let symbols_tag = format!(",{},", symbols.join(","));
        let conn = self.lock();
        conn.execute(
            "INSERT OR REPLACE INTO analysis_cache (key, symbols, payload, computed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![result.key, symbols_tag, payload, result.computed_at],
        )
        .map_err(backend)?;
        Ok(())
    }

    async fn invalidate_symbol(&self, symbol: &str) -> Result<usize, StoreError> {
        let conn = self.lock();
        let bars = conn
            .execute("DELETE FROM price_bars WHERE symbol = ?1", params![symbol])
            .map_err(backend)?;
        let coverage = conn
            .execute(
                "DELETE FROM series_coverage WHERE symbol = ?1",
                params![symbol],
            )
            .map_err(backend)?;
        let analysis = conn
            .execute(
                "DELETE FROM analysis_cache WHERE symbols LIKE ?1",
                params![format!("%,{},%", symbol)],
            )
            .map_err(backend)?;
        Ok(bars + coverage + analysis)
    }

    async fn invalidate_all(&self) -> Result<usize, StoreError> {
        let conn = self.lock();
        let bars = conn
            .execute("DELETE FROM price_bars", [])
            .map_err(backend)?;
        let coverage = conn
            .execute("DELETE FROM series_coverage", [])
            .map_err(backend)?;
        let analysis = conn
            .execute("DELETE FROM analysis_cache", [])
            .map_err(backend)?;
        Ok(bars + coverage + analysis)
    }
}

fn backend(err: rusqlite::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}
