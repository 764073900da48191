//! Market session clock
//!
//! Every gate the system applies (trading day, market hours, entry window)
//! is answered here from a wall-clock timestamp, so callers pass `now` in
//! and tests can pin it.

use anyhow::Result;
use chrono::{DateTime, Datelike, Local, NaiveTime, Weekday};

use crate::config::{parse_time, SessionConfig};

#[derive(Debug, Clone)]
pub struct MarketSession {
    active_days: Vec<Weekday>,
    premarket_start: NaiveTime,
    market_open: NaiveTime,
    market_close: NaiveTime,
    entry_start: NaiveTime,
    entry_end: NaiveTime,
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

impl MarketSession {
    pub fn from_config(cfg: &SessionConfig) -> Result<Self> {
        Ok(Self {
            active_days: cfg.active_weekdays()?,
            premarket_start: parse_time(&cfg.premarket_start)?,
            market_open: parse_time(&cfg.market_open)?,
            market_close: parse_time(&cfg.market_close)?,
            entry_start: parse_time(&cfg.entry_window_start)?,
            entry_end: parse_time(&cfg.entry_window_end)?,
        })
    }

    pub fn active_days(&self) -> &[Weekday] {
        &self.active_days
    }

    pub fn premarket_start(&self) -> NaiveTime {
        self.premarket_start
    }

    pub fn market_close(&self) -> NaiveTime {
        self.market_close
    }

    pub fn is_trading_day(&self, now: &DateTime<Local>) -> bool {
        self.active_days.contains(&now.weekday())
    }

    pub fn is_friday(&self, now: &DateTime<Local>) -> bool {
        now.weekday() == Weekday::Fri
    }

    /// Pre-market scan start through the close.
    pub fn is_market_hours(&self, now: &DateTime<Local>) -> bool {
        let t = now.time();
        self.premarket_start <= t && t <= self.market_close
    }

    pub fn is_entry_window(&self, now: &DateTime<Local>) -> bool {
        let t = now.time();
        self.entry_start <= t && t <= self.entry_end
    }

    /// First ninety minutes of the session, the best 0DTE entry window.
    pub fn is_morning_window(&self, now: &DateTime<Local>) -> bool {
        let t = now.time();
        self.market_open <= t && t <= hm(11, 0)
    }

    pub fn is_collection_time(&self, now: &DateTime<Local>) -> bool {
        let t = now.time();
        self.is_trading_day(now) && self.market_open <= t && t <= self.market_close
    }

    /// From the close through five minutes after it, on a trading day.
    pub fn is_eod_calculation_time(&self, now: &DateTime<Local>) -> bool {
        let t = now.time();
        let eod_end = self.market_close + chrono::Duration::minutes(5);
        self.is_trading_day(now) && self.market_close <= t && t <= eod_end
    }

    /// Days to expiration of the nearest weekly: 0 on Friday, else 1.
    pub fn dte_for(&self, now: &DateTime<Local>) -> u32 {
        if self.is_friday(now) {
            0
        } else {
            1
        }
    }
}

impl Default for MarketSession {
    fn default() -> Self {
        Self {
            active_days: vec![Weekday::Thu, Weekday::Fri],
            premarket_start: hm(9, 0),
            market_open: hm(9, 30),
            market_close: hm(16, 0),
            entry_start: hm(9, 30),
            entry_end: hm(15, 30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // 2025-01-09 is a Thursday, 2025-01-10 a Friday, 2025-01-08 a Wednesday.
    fn at(day: u32, h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 1, day, h, m, 0).unwrap()
    }

    #[test]
    fn test_trading_days() {
        let s = MarketSession::default();
        assert!(!s.is_trading_day(&at(8, 10, 0)));
        assert!(s.is_trading_day(&at(9, 10, 0)));
        assert!(s.is_trading_day(&at(10, 10, 0)));
        assert!(s.is_friday(&at(10, 10, 0)));
        assert!(!s.is_friday(&at(9, 10, 0)));
    }

    #[test]
    fn test_market_hours_inclusive() {
        let s = MarketSession::default();
        assert!(!s.is_market_hours(&at(9, 8, 59)));
        assert!(s.is_market_hours(&at(9, 9, 0)));
        assert!(s.is_market_hours(&at(9, 16, 0)));
        assert!(!s.is_market_hours(&at(9, 16, 1)));
    }

    #[test]
    fn test_windows() {
        let s = MarketSession::default();
        assert!(s.is_morning_window(&at(10, 10, 30)));
        assert!(!s.is_morning_window(&at(10, 11, 1)));
        assert!(s.is_entry_window(&at(10, 15, 30)));
        assert!(!s.is_entry_window(&at(10, 15, 45)));
        assert!(!s.is_entry_window(&at(10, 9, 15)));
    }

    #[test]
    fn test_collection_window() {
        let s = MarketSession::default();
        assert!(s.is_collection_time(&at(9, 9, 30)));
        assert!(!s.is_collection_time(&at(9, 9, 29)));
        assert!(!s.is_collection_time(&at(8, 12, 0)));
    }

    #[test]
    fn test_eod_calculation_window() {
        let s = MarketSession::default();
        assert!(!s.is_eod_calculation_time(&at(10, 15, 59)));
        assert!(s.is_eod_calculation_time(&at(10, 16, 0)));
        assert!(s.is_eod_calculation_time(&at(10, 16, 5)));
        assert!(!s.is_eod_calculation_time(&at(10, 16, 6)));
        // Saturday
        assert!(!s.is_eod_calculation_time(&at(11, 16, 2)));
    }

    #[test]
    fn test_dte() {
        let s = MarketSession::default();
        assert_eq!(s.dte_for(&at(10, 10, 0)), 0);
        assert_eq!(s.dte_for(&at(9, 10, 0)), 1);
    }

    #[test]
    fn test_from_config() {
        let mut cfg = SessionConfig::default();
        cfg.active_days = vec!["Monday".to_string()];
        cfg.entry_window_end = "12:00".to_string();
        let s = MarketSession::from_config(&cfg).unwrap();
        assert_eq!(s.active_days(), &[Weekday::Mon]);
        assert!(!s.is_entry_window(&at(10, 12, 30)));
    }
}
