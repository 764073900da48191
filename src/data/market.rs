//! Market data contract
//!
//! Quotes, option chains and bar history for the watched underlying. The
//! detectors and the options collector only see the `MarketData` trait.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub bid: f64,
    pub ask: f64,
    pub volume: u64,
    pub change: f64,
    pub change_pct: f64,
    pub timestamp: DateTime<Local>,
}

impl Quote {
    /// Build a quote from the last price and previous close.
    pub fn from_prices(symbol: &str, price: f64, previous_close: Option<f64>, volume: u64) -> Self {
        let prev = previous_close.filter(|p| *p > 0.0).unwrap_or(price);
        let change = price - prev;
        let change_pct = if prev > 0.0 { change / prev * 100.0 } else { 0.0 };
        Self {
            symbol: symbol.to_string(),
            price,
            bid: price,
            ask: price,
            volume,
            change,
            change_pct,
            timestamp: Local::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub strike: f64,
    pub last_price: f64,
    pub bid: f64,
    pub ask: f64,
    pub volume: u64,
    pub open_interest: u64,
    pub implied_volatility: f64,
}

impl OptionContract {
    /// Bid/ask midpoint when both sides quote, else the last trade.
    pub fn mid_price(&self) -> f64 {
        if self.bid > 0.0 && self.ask > 0.0 {
            (self.bid + self.ask) / 2.0
        } else {
            self.last_price
        }
    }
}

/// One expiration's chain. Contracts are kept in ascending strike order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsChain {
    pub expiration: Option<NaiveDate>,
    pub expirations: Vec<NaiveDate>,
    pub calls: Vec<OptionContract>,
    pub puts: Vec<OptionContract>,
}

impl OptionsChain {
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty() && self.puts.is_empty()
    }

    pub fn sort_by_strike(&mut self) {
        self.calls.sort_by(|a, b| a.strike.total_cmp(&b.strike));
        self.puts.sort_by(|a, b| a.strike.total_cmp(&b.strike));
    }

    /// Calls struck above `price`, nearest first.
    pub fn otm_calls(&self, price: f64, n: usize) -> Vec<&OptionContract> {
        self.calls.iter().filter(|c| c.strike > price).take(n).collect()
    }

    /// Puts struck below `price`, nearest first.
    pub fn otm_puts(&self, price: f64, n: usize) -> Vec<&OptionContract> {
        self.puts
            .iter()
            .rev()
            .filter(|p| p.strike < price)
            .take(n)
            .collect()
    }
}

/// An OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: DateTime<Local>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

#[async_trait]
pub trait MarketData: Send + Sync {
    async fn get_quote(&self, symbol: &str) -> Result<Quote>;

    /// Chain for `expiration`, or the nearest one when `None` or unknown.
    async fn get_options_chain(&self, symbol: &str, expiration: Option<NaiveDate>) -> Result<OptionsChain>;

    /// Bars over `range` ("1d", "30d", "1y") at `interval` ("5m", "1d").
    async fn get_history(&self, symbol: &str, range: &str, interval: &str) -> Result<Vec<Bar>>;
}
