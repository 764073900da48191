//! In-memory fakes shared by the unit tests

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::comms::discord::Notifier;
use crate::core::types::Signal;
use crate::data::market::{Bar, MarketData, OptionContract, OptionsChain, Quote};
use crate::data::news::{CompanyNewsFeed, NewsArticle, NewsSearch};

/// 2025-01-08 is a Wednesday, 01-09 a Thursday, 01-10 a Friday.
pub fn at(day: u32, h: u32, m: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(2025, 1, day, h, m, 0).unwrap()
}

pub fn contract(strike: f64, last_price: f64, volume: u64, open_interest: u64) -> OptionContract {
    OptionContract {
        strike,
        last_price,
        bid: (last_price - 0.05).max(0.0),
        ask: last_price + 0.05,
        volume,
        open_interest,
        implied_volatility: 0.9,
    }
}

pub struct FakeMarket {
    quote: Mutex<(f64, f64)>,
    chain: Mutex<OptionsChain>,
    history: Mutex<HashMap<String, Vec<Bar>>>,
    failing: AtomicBool,
}

impl FakeMarket {
    pub fn new(price: f64, change_pct: f64) -> Self {
        Self {
            quote: Mutex::new((price, change_pct)),
            chain: Mutex::new(OptionsChain::default()),
            history: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_quote(&self, price: f64, change_pct: f64) {
        *self.quote.lock().unwrap() = (price, change_pct);
    }

    /// Chain expiring Friday 2025-01-10 with the next weekly listed after it.
    pub fn set_chain(&self, calls: Vec<OptionContract>, puts: Vec<OptionContract>) {
        let friday = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let next = NaiveDate::from_ymd_opt(2025, 1, 17).unwrap();
        let mut chain = OptionsChain {
            expiration: Some(friday),
            expirations: vec![friday, next],
            calls,
            puts,
        };
        chain.sort_by_strike();
        *self.chain.lock().unwrap() = chain;
    }

    pub fn set_history(&self, symbol: &str, bars: Vec<Bar>) {
        self.history.lock().unwrap().insert(symbol.to_string(), bars);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl MarketData for FakeMarket {
    async fn get_quote(&self, symbol: &str) -> Result<Quote> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("quote feed down");
        }
        let (price, change_pct) = *self.quote.lock().unwrap();
        let prev = price / (1.0 + change_pct / 100.0);
        Ok(Quote::from_prices(symbol, price, Some(prev), 1_000_000))
    }

    async fn get_options_chain(&self, _symbol: &str, expiration: Option<NaiveDate>) -> Result<OptionsChain> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("options feed down");
        }
        let mut chain = self.chain.lock().unwrap().clone();
        if expiration.is_some() {
            chain.expiration = expiration;
        }
        Ok(chain)
    }

    async fn get_history(&self, symbol: &str, _range: &str, _interval: &str) -> Result<Vec<Bar>> {
        Ok(self.history.lock().unwrap().get(symbol).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct FakeNews {
    company: Mutex<HashMap<String, Vec<NewsArticle>>>,
    search: Mutex<Vec<NewsArticle>>,
}

impl FakeNews {
    pub fn push_company(&self, symbol: &str, article: NewsArticle) {
        self.company
            .lock()
            .unwrap()
            .entry(symbol.to_string())
            .or_default()
            .push(article);
    }

    pub fn push_search(&self, article: NewsArticle) {
        self.search.lock().unwrap().push(article);
    }
}

#[async_trait]
impl CompanyNewsFeed for FakeNews {
    async fn company_news(&self, symbol: &str, _days: i64, _now: DateTime<Local>) -> Result<Vec<NewsArticle>> {
        Ok(self.company.lock().unwrap().get(symbol).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl NewsSearch for FakeNews {
    async fn search_news(&self, _query: &str, _days: i64, _now: DateTime<Local>) -> Result<Vec<NewsArticle>> {
        Ok(self.search.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Signal>>,
    summaries: Mutex<Vec<(usize, f64)>>,
    tests: AtomicUsize,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Signal> {
        self.sent.lock().unwrap().clone()
    }

    pub fn summaries(&self) -> Vec<(usize, f64)> {
        self.summaries.lock().unwrap().clone()
    }

    pub fn test_messages(&self) -> usize {
        self.tests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_signal(&self, signal: &Signal) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("webhook returned 500");
        }
        self.sent.lock().unwrap().push(signal.clone());
        Ok(())
    }

    async fn send_test_message(&self) -> Result<()> {
        self.tests.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send_daily_summary(&self, signals: &[Signal], price_change: f64, _now: DateTime<Local>) -> Result<()> {
        self.summaries.lock().unwrap().push((signals.len(), price_change));
        Ok(())
    }
}
