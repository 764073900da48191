//! Historical option price tracking
//!
//! Snapshots of near-the-money OTM option prices are stored every few
//! minutes during the session. At the close they are rolled up into
//! averages per (type, strike-distance bucket, dte), which the price
//! comparison checker uses to spot elevated premiums.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::market::{MarketData, OptionContract};
use crate::core::types::{OptionType, PriceComparison, StrikeRecommendation};

pub const HISTORY_WEEKS: u32 = 6;
/// 34% above the historical average counts as elevated.
pub const PRICE_ELEVATION_THRESHOLD: f64 = 0.34;
pub const PRICE_ELEVATION_BOOST: f64 = 0.3;
/// Nearest OTM strikes collected per side and expiration.
const STRIKES_PER_SIDE: usize = 10;

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn ts(dt: &DateTime<Local>) -> String {
    dt.format(TS_FORMAT).to_string()
}

fn round_to_half(value: Decimal) -> Decimal {
    (value * dec!(2)).round() / dec!(2)
}

/// Signed dollar distance from spot to strike, in $0.50 buckets.
///
/// Calls are positive and at least +0.5, puts negative and at most -0.5.
pub fn strike_distance(strike: f64, stock_price: f64, option_type: OptionType) -> f64 {
    let strike = Decimal::from_f64(strike).unwrap_or_default();
    let price = Decimal::from_f64(stock_price).unwrap_or_default();
    let floor = dec!(0.5);

    let distance = match option_type {
        OptionType::Call => round_to_half(strike - price).max(floor),
        OptionType::Put => -round_to_half(price - strike).max(floor),
    };
    distance.to_f64().unwrap_or(0.0)
}

/// One stored option price observation
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSnapshot {
    pub timestamp: DateTime<Local>,
    pub symbol: String,
    pub stock_price: f64,
    pub expiration_date: NaiveDate,
    pub dte: u32,
    pub option_type: OptionType,
    pub strike: f64,
    pub strike_distance: f64,
    pub mid_price: f64,
    pub last_price: f64,
    pub bid: f64,
    pub ask: f64,
    pub volume: u64,
    pub open_interest: u64,
}

impl OptionSnapshot {
    pub fn from_contract(
        timestamp: DateTime<Local>,
        symbol: &str,
        stock_price: f64,
        expiration_date: NaiveDate,
        dte: u32,
        option_type: OptionType,
        contract: &OptionContract,
    ) -> Self {
        Self {
            timestamp,
            symbol: symbol.to_string(),
            stock_price,
            expiration_date,
            dte,
            option_type,
            strike: contract.strike,
            strike_distance: strike_distance(contract.strike, stock_price, option_type),
            mid_price: contract.mid_price(),
            last_price: contract.last_price,
            bid: contract.bid,
            ask: contract.ask,
            volume: contract.volume,
            open_interest: contract.open_interest,
        }
    }
}

const INSERT_SNAPSHOT: &str = "INSERT OR REPLACE INTO option_snapshots
    (timestamp, symbol, stock_price, expiration_date, dte, option_type,
     strike, strike_distance, mid_price, last_price, bid, ask, volume, open_interest)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)";

fn insert_snapshot(conn: &rusqlite::Connection, s: &OptionSnapshot) -> rusqlite::Result<usize> {
    conn.execute(
        INSERT_SNAPSHOT,
        rusqlite::params![
            ts(&s.timestamp),
            s.symbol,
            s.stock_price,
            s.expiration_date.format("%Y-%m-%d").to_string(),
            s.dte as i64,
            s.option_type.as_str(),
            s.strike,
            s.strike_distance,
            s.mid_price,
            s.last_price,
            s.bid,
            s.ask,
            s.volume as i64,
            s.open_interest as i64,
        ],
    )
}

/// SQLite store for option snapshots and their rolling averages
pub struct OptionsHistoryDb {
    conn: Mutex<rusqlite::Connection>,
}

impl OptionsHistoryDb {
    pub fn open(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = rusqlite::Connection::open(path)?;
        let db = Self { conn: Mutex::new(conn) };
        db.init()?;
        info!("Options history database ready at {}", path);
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Mutex::new(rusqlite::Connection::open_in_memory()?),
        };
        db.init()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, rusqlite::Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("options history connection poisoned"))
    }

    fn init(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS option_snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                symbol TEXT NOT NULL,
                stock_price REAL NOT NULL,
                expiration_date TEXT NOT NULL,
                dte INTEGER NOT NULL,
                option_type TEXT NOT NULL,
                strike REAL NOT NULL,
                strike_distance REAL NOT NULL,
                mid_price REAL,
                last_price REAL,
                bid REAL,
                ask REAL,
                volume INTEGER,
                open_interest INTEGER,
                UNIQUE (timestamp, symbol, expiration_date, strike, option_type)
            );
            CREATE INDEX IF NOT EXISTS idx_snapshots_lookup
                ON option_snapshots(symbol, option_type, strike_distance, dte);
            CREATE INDEX IF NOT EXISTS idx_snapshots_timestamp
                ON option_snapshots(timestamp);

            CREATE TABLE IF NOT EXISTS weekly_averages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                calculated_at TEXT NOT NULL,
                symbol TEXT NOT NULL,
                option_type TEXT NOT NULL,
                strike_distance REAL NOT NULL,
                dte INTEGER NOT NULL,
                avg_mid_price REAL NOT NULL,
                sample_count INTEGER NOT NULL,
                min_price REAL,
                max_price REAL,
                UNIQUE (calculated_at, symbol, option_type, strike_distance, dte)
            );
            CREATE INDEX IF NOT EXISTS idx_averages_lookup
                ON weekly_averages(symbol, option_type, strike_distance, dte);

            CREATE TABLE IF NOT EXISTS data_collection_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                collection_date TEXT NOT NULL,
                day_of_week TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT,
                snapshots_collected INTEGER DEFAULT 0,
                status TEXT DEFAULT 'in_progress',
                error_message TEXT,
                UNIQUE (collection_date)
            );",
        )?;
        Ok(())
    }

    pub fn store_snapshot(&self, snapshot: &OptionSnapshot) -> Result<()> {
        let conn = self.conn()?;
        insert_snapshot(&conn, snapshot)?;
        Ok(())
    }

    /// Store in one transaction; rows that fail are logged and skipped.
    pub fn store_snapshots_batch(&self, snapshots: &[OptionSnapshot]) -> Result<usize> {
        if snapshots.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut count = 0;
        for snapshot in snapshots {
            match insert_snapshot(&tx, snapshot) {
                Ok(_) => count += 1,
                Err(e) => warn!("Failed to store snapshot: {}", e),
            }
        }
        tx.commit()?;
        Ok(count)
    }

    /// Latest stored average for the bucket, else the raw mean of positive
    /// mids over the history window.
    pub fn get_average_price(
        &self,
        symbol: &str,
        option_type: OptionType,
        strike_distance: f64,
        dte: u32,
        now: DateTime<Local>,
    ) -> Result<Option<f64>> {
        let conn = self.conn()?;

        let stored: Option<f64> = conn
            .query_row(
                "SELECT avg_mid_price FROM weekly_averages
                 WHERE symbol = ?1 AND option_type = ?2 AND strike_distance = ?3 AND dte = ?4
                 ORDER BY calculated_at DESC
                 LIMIT 1",
                rusqlite::params![symbol, option_type.as_str(), strike_distance, dte as i64],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        if stored.is_some() {
            return Ok(stored);
        }

        let cutoff = ts(&(now - Duration::weeks(HISTORY_WEEKS as i64)));
        let raw: Option<f64> = conn.query_row(
            "SELECT AVG(mid_price) FROM option_snapshots
             WHERE symbol = ?1 AND option_type = ?2 AND strike_distance = ?3 AND dte = ?4
               AND timestamp >= ?5
               AND mid_price IS NOT NULL AND mid_price > 0",
            rusqlite::params![symbol, option_type.as_str(), strike_distance, dte as i64, cutoff],
            |row| row.get(0),
        )?;
        Ok(raw)
    }

    /// Roll the history window into `weekly_averages`. Returns the number of
    /// buckets written.
    pub fn calculate_and_store_averages(&self, symbol: &str, now: DateTime<Local>) -> Result<usize> {
        let mut conn = self.conn()?;
        let cutoff = ts(&(now - Duration::weeks(HISTORY_WEEKS as i64)));
        let calculated_at = ts(&now);

        let tx = conn.transaction()?;
        let written = tx.execute(
            "INSERT OR REPLACE INTO weekly_averages
                (calculated_at, symbol, option_type, strike_distance, dte,
                 avg_mid_price, sample_count, min_price, max_price)
             SELECT ?1, symbol, option_type, strike_distance, dte,
                    AVG(mid_price), COUNT(*), MIN(mid_price), MAX(mid_price)
             FROM option_snapshots
             WHERE symbol = ?2 AND timestamp >= ?3
               AND mid_price IS NOT NULL AND mid_price > 0
             GROUP BY option_type, strike_distance, dte",
            rusqlite::params![calculated_at, symbol, cutoff],
        )?;
        tx.commit()?;

        info!("Calculated and stored {} averages", written);
        Ok(written)
    }

    /// Drop snapshots older than `weeks` and averages outside the two most
    /// recent calculations. Returns the number of snapshots deleted.
    pub fn cleanup_old_data(&self, weeks: u32, now: DateTime<Local>) -> Result<usize> {
        let conn = self.conn()?;
        let cutoff = ts(&(now - Duration::weeks(weeks as i64)));

        let deleted = conn.execute(
            "DELETE FROM option_snapshots WHERE timestamp < ?1",
            [cutoff],
        )?;
        conn.execute(
            "DELETE FROM weekly_averages
             WHERE calculated_at NOT IN (
                 SELECT DISTINCT calculated_at FROM weekly_averages
                 ORDER BY calculated_at DESC LIMIT 2
             )",
            [],
        )?;

        info!("Cleaned up {} old snapshots", deleted);
        Ok(deleted)
    }

    pub fn snapshot_count(&self, symbol: &str) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM option_snapshots WHERE symbol = ?1",
            [symbol],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn average_count(&self, symbol: &str) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM weekly_averages WHERE symbol = ?1",
            [symbol],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Add `collected` to today's collection log, opening the row if needed.
    pub fn record_collection(&self, now: DateTime<Local>, collected: usize) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO data_collection_log
                (collection_date, day_of_week, start_time, end_time, snapshots_collected, status)
             VALUES (?1, ?2, ?3, ?3, ?4, 'in_progress')
             ON CONFLICT(collection_date) DO UPDATE SET
                end_time = excluded.end_time,
                snapshots_collected = snapshots_collected + excluded.snapshots_collected",
            rusqlite::params![
                now.format("%Y-%m-%d").to_string(),
                now.weekday().to_string(),
                ts(&now),
                collected as i64,
            ],
        )?;
        Ok(())
    }

    /// Close today's collection log with a final status.
    pub fn complete_collection(&self, now: DateTime<Local>, error: Option<&str>) -> Result<()> {
        let conn = self.conn()?;
        let status = if error.is_some() { "failed" } else { "complete" };
        conn.execute(
            "UPDATE data_collection_log
             SET status = ?1, error_message = ?2, end_time = ?3
             WHERE collection_date = ?4",
            rusqlite::params![status, error, ts(&now), now.format("%Y-%m-%d").to_string()],
        )?;
        Ok(())
    }

    /// (snapshots collected, status) for a collection date.
    pub fn collection_status(&self, date: NaiveDate) -> Result<Option<(u64, String)>> {
        let conn = self.conn()?;
        let row = conn.query_row(
            "SELECT snapshots_collected, status FROM data_collection_log WHERE collection_date = ?1",
            [date.format("%Y-%m-%d").to_string()],
            |row| Ok((row.get::<_, i64>(0)? as u64, row.get::<_, String>(1)?)),
        );
        match row {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Snapshots OTM option prices for the nearest two expirations
pub struct OptionsCollector {
    db: Arc<OptionsHistoryDb>,
    market: Arc<dyn MarketData>,
}

impl OptionsCollector {
    pub fn new(db: Arc<OptionsHistoryDb>, market: Arc<dyn MarketData>) -> Self {
        Self { db, market }
    }

    /// Returns the number of snapshots stored.
    pub async fn collect_snapshot(&self, symbol: &str, now: DateTime<Local>) -> Result<usize> {
        let quote = self.market.get_quote(symbol).await?;
        let stock_price = quote.price;
        if stock_price <= 0.0 {
            warn!("Could not get stock price for {}", symbol);
            return Ok(0);
        }

        let chain = self.market.get_options_chain(symbol, None).await?;
        if chain.is_empty() {
            warn!("Could not get options chain for {}", symbol);
            return Ok(0);
        }

        let mut snapshots = Vec::new();
        // dte here is the expiry index (0 = nearest listed), not calendar days
        for (dte, expiration) in chain.expirations.iter().take(2).enumerate() {
            let exp_chain = match self.market.get_options_chain(symbol, Some(*expiration)).await {
                Ok(c) if !c.is_empty() => c,
                Ok(_) => chain.clone(),
                Err(e) => {
                    debug!("Expiry {} fetch failed, using default chain: {}", expiration, e);
                    chain.clone()
                }
            };

            for contract in exp_chain.otm_calls(stock_price, STRIKES_PER_SIDE) {
                snapshots.push(OptionSnapshot::from_contract(
                    now, symbol, stock_price, *expiration, dte as u32, OptionType::Call, contract,
                ));
            }
            for contract in exp_chain.otm_puts(stock_price, STRIKES_PER_SIDE) {
                snapshots.push(OptionSnapshot::from_contract(
                    now, symbol, stock_price, *expiration, dte as u32, OptionType::Put, contract,
                ));
            }
        }

        let stored = self.db.store_snapshots_batch(&snapshots)?;
        if stored > 0 {
            self.db.record_collection(now, stored)?;
        }
        debug!("Collected {} option snapshots for {}", stored, symbol);
        Ok(stored)
    }
}

/// Compares current option prices with their historical bucket average
pub struct PriceComparisonChecker {
    db: Arc<OptionsHistoryDb>,
    symbol: String,
}

impl PriceComparisonChecker {
    pub fn new(db: Arc<OptionsHistoryDb>, symbol: &str) -> Self {
        Self {
            db,
            symbol: symbol.to_string(),
        }
    }

    pub fn check_price_elevation(
        &self,
        current_price: f64,
        option_type: OptionType,
        strike_distance: f64,
        dte: u32,
        now: DateTime<Local>,
    ) -> PriceComparison {
        let avg = match self
            .db
            .get_average_price(&self.symbol, option_type, strike_distance, dte, now)
        {
            Ok(avg) => avg,
            Err(e) => {
                warn!("Price elevation check failed: {}", e);
                None
            }
        };

        let Some(avg_price) = avg.filter(|a| *a > 0.0) else {
            return PriceComparison::no_history(current_price);
        };

        if current_price <= 0.0 {
            return PriceComparison {
                avg_price: Some(avg_price),
                has_historical_data: true,
                ..PriceComparison::no_history(current_price)
            };
        }

        let elevation_pct = (current_price - avg_price) / avg_price;
        let is_elevated = elevation_pct >= PRICE_ELEVATION_THRESHOLD;

        PriceComparison {
            is_elevated,
            current_price,
            avg_price: Some(avg_price),
            elevation_pct: Some(elevation_pct),
            confidence_boost: if is_elevated { PRICE_ELEVATION_BOOST } else { 0.0 },
            has_historical_data: true,
        }
    }

    /// Annotate each strike with its price comparison. Returns the strikes
    /// and the largest confidence boost among them.
    pub fn evaluate_strikes(
        &self,
        strikes: Vec<StrikeRecommendation>,
        stock_price: f64,
        option_type: OptionType,
        dte: u32,
        now: DateTime<Local>,
    ) -> (Vec<StrikeRecommendation>, f64) {
        let mut max_boost: f64 = 0.0;

        let enhanced = strikes
            .into_iter()
            .map(|mut strike| {
                let distance = strike_distance(strike.strike, stock_price, option_type);
                let price = strike.option_price().unwrap_or(0.0);
                let comparison = self.check_price_elevation(price, option_type, distance, dte, now);
                max_boost = max_boost.max(comparison.confidence_boost);
                strike.price_comparison = Some(comparison);
                strike
            })
            .collect();

        (enhanced, max_boost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::RiskLevel;
    use crate::testing::{at, contract, FakeMarket};

    fn snapshot(when: DateTime<Local>, option_type: OptionType, distance: f64, mid: f64) -> OptionSnapshot {
        OptionSnapshot {
            timestamp: when,
            symbol: "APP".to_string(),
            stock_price: 300.0,
            expiration_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            dte: 0,
            option_type,
            strike: 300.0 + distance,
            strike_distance: distance,
            mid_price: mid,
            last_price: mid,
            bid: mid - 0.05,
            ask: mid + 0.05,
            volume: 100,
            open_interest: 500,
        }
    }

    #[test]
    fn test_strike_distance_buckets() {
        assert_eq!(strike_distance(302.6, 300.0, OptionType::Call), 2.5);
        assert_eq!(strike_distance(300.1, 300.0, OptionType::Call), 0.5);
        assert_eq!(strike_distance(310.0, 300.0, OptionType::Call), 10.0);
        assert_eq!(strike_distance(295.0, 300.0, OptionType::Put), -5.0);
        assert_eq!(strike_distance(299.9, 300.0, OptionType::Put), -0.5);
        // 0.75 * 2 = 1.5 rounds half-to-even to 2
        assert_eq!(strike_distance(300.75, 300.0, OptionType::Call), 1.0);
    }

    #[test]
    fn test_store_and_count() {
        let db = OptionsHistoryDb::open_in_memory().unwrap();
        let now = at(10, 10, 0);
        db.store_snapshot(&snapshot(now, OptionType::Call, 2.5, 1.0)).unwrap();
        // same key replaces
        db.store_snapshot(&snapshot(now, OptionType::Call, 2.5, 1.2)).unwrap();
        assert_eq!(db.snapshot_count("APP").unwrap(), 1);
        assert_eq!(db.snapshot_count("TTD").unwrap(), 0);

        let batch = vec![
            snapshot(now, OptionType::Put, -2.5, 0.8),
            snapshot(now + Duration::minutes(5), OptionType::Call, 2.5, 1.4),
        ];
        assert_eq!(db.store_snapshots_batch(&batch).unwrap(), 2);
        assert_eq!(db.snapshot_count("APP").unwrap(), 3);
        assert_eq!(db.store_snapshots_batch(&[]).unwrap(), 0);
    }

    #[test]
    fn test_average_falls_back_to_raw_snapshots() {
        let db = OptionsHistoryDb::open_in_memory().unwrap();
        let now = at(10, 12, 0);
        db.store_snapshots_batch(&[
            snapshot(now - Duration::minutes(10), OptionType::Call, 2.5, 1.0),
            snapshot(now - Duration::minutes(5), OptionType::Call, 2.5, 2.0),
            snapshot(now - Duration::minutes(5), OptionType::Put, -2.5, 9.0),
            snapshot(now - Duration::weeks(7), OptionType::Call, 2.5, 50.0),
        ])
        .unwrap();

        let avg = db
            .get_average_price("APP", OptionType::Call, 2.5, 0, now)
            .unwrap()
            .unwrap();
        assert!((avg - 1.5).abs() < 1e-9);
        assert_eq!(db.get_average_price("APP", OptionType::Call, 5.0, 0, now).unwrap(), None);
    }

    #[test]
    fn test_stored_average_wins() {
        let db = OptionsHistoryDb::open_in_memory().unwrap();
        let now = at(10, 16, 1);
        db.store_snapshots_batch(&[
            snapshot(now - Duration::hours(2), OptionType::Call, 2.5, 1.0),
            snapshot(now - Duration::hours(1), OptionType::Call, 2.5, 3.0),
            snapshot(now - Duration::hours(1), OptionType::Put, -5.0, 0.5),
        ])
        .unwrap();

        assert_eq!(db.calculate_and_store_averages("APP", now).unwrap(), 2);
        db.store_snapshot(&snapshot(now, OptionType::Call, 2.5, 100.0)).unwrap();

        let avg = db
            .get_average_price("APP", OptionType::Call, 2.5, 0, now)
            .unwrap()
            .unwrap();
        assert!((avg - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_cleanup_keeps_two_calculations() {
        let db = OptionsHistoryDb::open_in_memory().unwrap();
        let now = at(10, 16, 5);
        db.store_snapshots_batch(&[
            snapshot(now - Duration::weeks(7), OptionType::Call, 2.5, 1.0),
            snapshot(now - Duration::days(1), OptionType::Call, 2.5, 1.0),
        ])
        .unwrap();
        for days_ago in [14, 7, 1] {
            db.calculate_and_store_averages("APP", now - Duration::days(days_ago)).unwrap();
        }
        assert_eq!(db.average_count("APP").unwrap(), 3);

        assert_eq!(db.cleanup_old_data(6, now).unwrap(), 1);
        assert_eq!(db.snapshot_count("APP").unwrap(), 1);
        assert_eq!(db.average_count("APP").unwrap(), 2);
    }

    #[test]
    fn test_collection_log() {
        let db = OptionsHistoryDb::open_in_memory().unwrap();
        let now = at(10, 10, 0);
        db.record_collection(now, 20).unwrap();
        db.record_collection(now + Duration::minutes(5), 18).unwrap();
        assert_eq!(
            db.collection_status(now.date_naive()).unwrap(),
            Some((38, "in_progress".to_string()))
        );
        db.complete_collection(now + Duration::hours(6), None).unwrap();
        assert_eq!(
            db.collection_status(now.date_naive()).unwrap(),
            Some((38, "complete".to_string()))
        );
    }

    #[tokio::test]
    async fn test_collector_takes_two_expirations() {
        let db = Arc::new(OptionsHistoryDb::open_in_memory().unwrap());
        let market = Arc::new(FakeMarket::new(300.0, 1.0));
        let strikes: Vec<f64> = (0..30).map(|i| 270.0 + i as f64 * 2.5).collect();
        market.set_chain(
            strikes.iter().map(|s| contract(*s, 1.0, 100, 200)).collect(),
            strikes.iter().map(|s| contract(*s, 1.0, 100, 200)).collect(),
        );

        let collector = OptionsCollector::new(db.clone(), market);
        let now = at(10, 10, 0);
        let stored = collector.collect_snapshot("APP", now).await.unwrap();
        // 10 calls + 10 puts for each of two expirations
        assert_eq!(stored, 40);
        assert_eq!(db.snapshot_count("APP").unwrap(), 40);
        assert_eq!(db.collection_status(now.date_naive()).unwrap().unwrap().0, 40);
    }

    #[tokio::test]
    async fn test_collector_buckets_by_expiry_index() {
        let db = Arc::new(OptionsHistoryDb::open_in_memory().unwrap());
        let market = Arc::new(FakeMarket::new(300.0, 0.0));
        market.set_chain(vec![contract(305.0, 0.5, 10, 10)], vec![]);
        let collector = OptionsCollector::new(db.clone(), market);

        // Thursday: Friday's expiry is one calendar day out but lands in bucket 0
        let now = at(9, 10, 0);
        assert_eq!(collector.collect_snapshot("APP", now).await.unwrap(), 2);
        let avg = |dte| db.get_average_price("APP", OptionType::Call, 5.0, dte, now).unwrap();
        assert!((avg(0).unwrap() - 0.5).abs() < 1e-9);
        assert!((avg(1).unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(avg(2), None);
    }

    #[tokio::test]
    async fn test_collector_skips_without_price() {
        let db = Arc::new(OptionsHistoryDb::open_in_memory().unwrap());
        let market = Arc::new(FakeMarket::new(0.0, 0.0));
        let collector = OptionsCollector::new(db.clone(), market);
        assert_eq!(collector.collect_snapshot("APP", at(10, 10, 0)).await.unwrap(), 0);
    }

    #[test]
    fn test_price_elevation() {
        let db = Arc::new(OptionsHistoryDb::open_in_memory().unwrap());
        let now = at(10, 12, 0);
        db.store_snapshot(&snapshot(now - Duration::hours(1), OptionType::Call, 5.0, 0.50))
            .unwrap();
        let checker = PriceComparisonChecker::new(db, "APP");

        let hot = checker.check_price_elevation(0.70, OptionType::Call, 5.0, 0, now);
        assert!(hot.is_elevated);
        assert_eq!(hot.confidence_boost, PRICE_ELEVATION_BOOST);
        assert!((hot.elevation_pct.unwrap() - 0.4).abs() < 1e-9);

        let normal = checker.check_price_elevation(0.60, OptionType::Call, 5.0, 0, now);
        assert!(!normal.is_elevated);
        assert_eq!(normal.confidence_boost, 0.0);

        let unknown = checker.check_price_elevation(0.60, OptionType::Call, 7.5, 0, now);
        assert!(!unknown.has_historical_data);

        let unpriced = checker.check_price_elevation(0.0, OptionType::Call, 5.0, 0, now);
        assert!(unpriced.has_historical_data);
        assert_eq!(unpriced.elevation_pct, None);
    }

    #[test]
    fn test_evaluate_strikes_max_boost() {
        let db = Arc::new(OptionsHistoryDb::open_in_memory().unwrap());
        let now = at(10, 12, 0);
        db.store_snapshot(&snapshot(now - Duration::hours(1), OptionType::Call, 15.0, 0.50))
            .unwrap();
        let checker = PriceComparisonChecker::new(db, "APP");

        let mut elevated = StrikeRecommendation::new(315.0, OptionType::Call, 5.0, RiskLevel::Moderate);
        elevated.last_price = Some(0.90);
        let bare = StrikeRecommendation::new(330.0, OptionType::Call, 10.0, RiskLevel::High);

        let (strikes, boost) = checker.evaluate_strikes(vec![elevated, bare], 300.0, OptionType::Call, 0, now);
        assert_eq!(boost, PRICE_ELEVATION_BOOST);
        assert!(strikes[0].price_comparison.as_ref().unwrap().is_elevated);
        assert!(!strikes[1].price_comparison.as_ref().unwrap().has_historical_data);

        let (empty, none) = checker.evaluate_strikes(vec![], 300.0, OptionType::Call, 0, now);
        assert!(empty.is_empty());
        assert_eq!(none, 0.0);
    }
}
