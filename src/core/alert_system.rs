//! Alert orchestration
//!
//! Runs the detectors, deduplicates what they find, sends alerts and keeps
//! the option price history ticking over. Every entry point takes `now` so
//! the runner and the tests drive the same code.

use anyhow::Result;
use chrono::{DateTime, Local};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::ad_sector::AdSectorSignal;
use super::calendar::MarketSession;
use super::company_news::CompanyNewsSignal;
use super::friday_0dte::Friday0DteSignal;
use super::live_news::LiveNewsSignal;
use super::schedule::Job;
use super::signal::SignalDetector;
use super::types::Signal;
use crate::comms::discord::Notifier;
use crate::config::Config;
use crate::data::market::MarketData;
use crate::data::news::{CompanyNewsFeed, NewsAggregator, NewsSearch};
use crate::data::options_history::{OptionsCollector, OptionsHistoryDb, PriceComparisonChecker};

/// Same detector and direction within this window is a repeat.
const DUPLICATE_WINDOW_SECS: i64 = 3600;
/// How many recent alerts the duplicate check looks back over.
const DUPLICATE_LOOKBACK: usize = 10;

pub struct AlertSystem {
    ticker: String,
    session: MarketSession,
    detectors: Vec<Box<dyn SignalDetector>>,
    live_news: Option<Box<dyn SignalDetector>>,
    notifier: Arc<dyn Notifier>,
    market: Arc<dyn MarketData>,
    history: Arc<OptionsHistoryDb>,
    collector: OptionsCollector,
    history_weeks: u32,
    signals_today: Vec<Signal>,
    last_check: Option<DateTime<Local>>,
    last_live_news_check: Option<DateTime<Local>>,
    snapshots_collected: u64,
    last_price: Option<f64>,
}

impl AlertSystem {
    /// An alert system with no detectors registered.
    pub fn new(
        ticker: &str,
        session: MarketSession,
        notifier: Arc<dyn Notifier>,
        market: Arc<dyn MarketData>,
        history: Arc<OptionsHistoryDb>,
        history_weeks: u32,
    ) -> Self {
        Self {
            ticker: ticker.to_string(),
            session,
            detectors: Vec::new(),
            live_news: None,
            collector: OptionsCollector::new(history.clone(), market.clone()),
            notifier,
            market,
            history,
            history_weeks,
            signals_today: Vec::new(),
            last_check: None,
            last_live_news_check: None,
            snapshots_collected: 0,
            last_price: None,
        }
    }

    /// The standard detector set plus live news, wired from config.
    pub fn from_config(
        cfg: &Config,
        market: Arc<dyn MarketData>,
        company_feed: Arc<dyn CompanyNewsFeed>,
        search: Arc<dyn NewsSearch>,
        notifier: Arc<dyn Notifier>,
        history: Arc<OptionsHistoryDb>,
    ) -> Result<Self> {
        let ticker = cfg.watch.ticker.as_str();
        let session = MarketSession::from_config(&cfg.session)?;
        let prices = Arc::new(PriceComparisonChecker::new(history.clone(), ticker));
        let news = Arc::new(NewsAggregator::new(company_feed.clone(), search, &cfg.watch));

        let mut system = Self::new(
            ticker,
            session.clone(),
            notifier,
            market.clone(),
            history,
            cfg.storage.history_weeks,
        );
        system.add_detector(Box::new(AdSectorSignal::new(
            ticker,
            session.clone(),
            news,
            market.clone(),
            Some(prices.clone()),
        )));
        system.add_detector(Box::new(CompanyNewsSignal::new(
            ticker,
            session.clone(),
            company_feed.clone(),
            market.clone(),
        )));
        system.add_detector(Box::new(Friday0DteSignal::new(ticker, session.clone(), market.clone())));
        system.set_live_news(Box::new(LiveNewsSignal::new(
            ticker,
            cfg.strategy.max_option_price,
            session,
            company_feed,
            market,
            Some(prices),
        )));
        Ok(system)
    }

    pub fn add_detector(&mut self, detector: Box<dyn SignalDetector>) {
        self.detectors.push(detector);
    }

    pub fn set_live_news(&mut self, detector: Box<dyn SignalDetector>) {
        self.live_news = Some(detector);
    }

    /// (name, description) of every registered detector, live news last.
    pub fn detector_descriptions(&self) -> Vec<(String, String)> {
        self.detectors
            .iter()
            .chain(self.live_news.iter())
            .map(|d| (d.name().to_string(), d.description().to_string()))
            .collect()
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn session(&self) -> &MarketSession {
        &self.session
    }

    pub fn signals_today(&self) -> &[Signal] {
        &self.signals_today
    }

    pub fn last_check(&self) -> Option<DateTime<Local>> {
        self.last_check
    }

    pub fn last_live_news_check(&self) -> Option<DateTime<Local>> {
        self.last_live_news_check
    }

    pub fn snapshots_collected(&self) -> u64 {
        self.snapshots_collected
    }

    pub fn last_price(&self) -> Option<f64> {
        self.last_price
    }

    pub fn history(&self) -> &OptionsHistoryDb {
        &self.history
    }

    fn is_active(&self, now: &DateTime<Local>) -> bool {
        self.session.is_trading_day(now) && self.session.is_market_hours(now)
    }

    /// Actionable signals from the standard detectors. A failing detector
    /// is logged and skipped.
    pub async fn check_signals(&mut self, now: DateTime<Local>) -> Vec<Signal> {
        let mut detected = Vec::new();

        for detector in self.detectors.iter_mut() {
            match detector.check(now).await {
                Ok(Some(signal)) if signal.is_actionable() => {
                    info!("Signal detected: {}", signal);
                    self.last_price = Some(signal.current_price);
                    detected.push(signal);
                }
                Ok(Some(signal)) => debug!("Ignoring non-actionable {}", signal),
                Ok(None) => {}
                Err(e) => error!("Error checking {}: {}", detector.name(), e),
            }
        }
        detected
    }

    fn is_duplicate(&self, signal: &Signal) -> bool {
        let start = self.signals_today.len().saturating_sub(DUPLICATE_LOOKBACK);
        self.signals_today[start..].iter().any(|recent| {
            recent.name == signal.name
                && recent.direction == signal.direction
                && (signal.timestamp - recent.timestamp).num_seconds().abs() < DUPLICATE_WINDOW_SECS
        })
    }

    /// Send each signal that is not a recent repeat. Returns how many went out.
    pub async fn process_signals(&mut self, signals: Vec<Signal>) -> usize {
        let mut sent = 0;

        for signal in signals {
            if self.is_duplicate(&signal) {
                debug!("Skipping duplicate signal: {}", signal.name);
                continue;
            }

            match self.notifier.send_signal(&signal).await {
                Ok(()) => {
                    info!("Alert sent for {}", signal.name);
                    self.signals_today.push(signal);
                    sent += 1;
                }
                Err(e) => error!("Failed to send alert for {}: {}", signal.name, e),
            }
        }
        sent
    }

    pub async fn run_check(&mut self, now: DateTime<Local>) {
        if !self.session.is_trading_day(&now) {
            info!("Not a trading day. Skipping check.");
            return;
        }
        if !self.session.is_market_hours(&now) {
            info!("Outside market hours. Skipping check.");
            return;
        }

        info!("Running standard signal check...");
        self.last_check = Some(now);

        let signals = self.check_signals(now).await;
        if signals.is_empty() {
            info!("No actionable signals detected");
        } else {
            info!("Detected {} actionable signal(s)", signals.len());
            self.process_signals(signals).await;
        }
    }

    pub async fn run_live_news_check(&mut self, now: DateTime<Local>) {
        if !self.is_active(&now) {
            return;
        }
        let Some(detector) = self.live_news.as_mut() else {
            return;
        };

        debug!("Running live news check...");
        self.last_live_news_check = Some(now);

        match detector.check(now).await {
            Ok(Some(signal)) if signal.is_actionable() => {
                info!("Live news signal detected: {}", signal);
                self.last_price = Some(signal.current_price);
                self.process_signals(vec![signal]).await;
            }
            Ok(_) => {}
            Err(e) => error!("Error checking live news: {}", e),
        }
    }

    pub async fn collect_options_data(&mut self, now: DateTime<Local>) {
        if !self.is_active(&now) {
            return;
        }

        match self.collector.collect_snapshot(&self.ticker, now).await {
            Ok(count) if count > 0 => {
                self.snapshots_collected += count as u64;
                debug!("Collected {} option price snapshots", count);
            }
            Ok(_) => {}
            Err(e) => {
                error!("Options data collection error: {}", e);
                if let Err(e) = self.history.complete_collection(now, Some(&e.to_string())) {
                    warn!("Could not update collection log: {}", e);
                }
            }
        }
    }

    pub fn recalculate_averages(&self, now: DateTime<Local>) {
        if !self.session.is_trading_day(&now) {
            return;
        }

        match self.history.calculate_and_store_averages(&self.ticker, now) {
            Ok(n) if n > 0 => info!("Historical price averages recalculated ({} buckets)", n),
            Ok(_) => warn!("No snapshots to average"),
            Err(e) => error!("Average calculation error: {}", e),
        }
        if let Err(e) = self.history.complete_collection(now, None) {
            warn!("Could not close collection log: {}", e);
        }
    }

    pub fn cleanup_old_history(&self, now: DateTime<Local>) {
        if !self.session.is_trading_day(&now) {
            return;
        }

        match self.history.cleanup_old_data(self.history_weeks, now) {
            Ok(n) if n > 0 => info!("Cleaned up {} old option price snapshots", n),
            Ok(_) => {}
            Err(e) => error!("History cleanup error: {}", e),
        }
    }

    /// Send the day's summary and start the next day clean.
    pub async fn send_daily_summary(&mut self, now: DateTime<Local>) {
        let change_pct = match self.market.get_quote(&self.ticker).await {
            Ok(q) => {
                self.last_price = Some(q.price);
                q.change_pct
            }
            Err(e) => {
                warn!("Could not get {} quote for summary: {}", self.ticker, e);
                0.0
            }
        };

        match self
            .notifier
            .send_daily_summary(&self.signals_today, change_pct, now)
            .await
        {
            Ok(()) => info!("Daily summary sent"),
            Err(e) => error!("Error sending daily summary: {}", e),
        }

        self.signals_today.clear();
        for detector in self.detectors.iter_mut().chain(self.live_news.iter_mut()) {
            detector.reset_daily();
        }
    }

    pub async fn run_job(&mut self, job: Job, now: DateTime<Local>) {
        match job {
            Job::StandardCheck => self.run_check(now).await,
            Job::LiveNewsCheck => self.run_live_news_check(now).await,
            Job::CollectOptions => self.collect_options_data(now).await,
            Job::RecalculateAverages => self.recalculate_averages(now),
            Job::CleanupHistory => self.cleanup_old_history(now),
            Job::DailySummary => self.send_daily_summary(now).await,
        }
    }

    /// One ungated pass for `--test`: webhook test, every detector, quote.
    /// Nothing is sent besides the test message.
    pub async fn test_pass(&mut self, now: DateTime<Local>) -> Vec<Signal> {
        info!("Testing Discord webhook...");
        match self.notifier.send_test_message().await {
            Ok(()) => info!("Discord webhook test successful!"),
            Err(e) => warn!("Discord webhook test failed ({}) - check DISCORD_WEBHOOK_URL", e),
        }

        info!("Running standard signal check...");
        let mut signals = self.check_signals(now).await;
        if signals.is_empty() {
            info!("No standard signals detected (this is normal if no catalyst present)");
        } else {
            info!("Found {} standard signals:", signals.len());
            for s in &signals {
                info!("  - {}", s);
            }
        }

        info!("Running live news signal check...");
        if let Some(detector) = self.live_news.as_mut() {
            match detector.check(now).await {
                Ok(Some(signal)) => {
                    info!("Live news signal: {}", signal);
                    signals.push(signal);
                }
                Ok(None) => info!("No live news signal detected"),
                Err(e) => error!("Error checking live news: {}", e),
            }
        }

        match self.market.get_quote(&self.ticker).await {
            Ok(q) => {
                self.last_price = Some(q.price);
                info!("Current {} price: ${:.2}", self.ticker, q.price);
                info!("Change: {:+.2}%", q.change_pct);
            }
            Err(e) => warn!("Could not get {} quote: {}", self.ticker, e),
        }
        signals
    }
}
