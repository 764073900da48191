//! Live intraday news detector
//!
//! Polled every couple of minutes during the entry window. Only headlines
//! from the last fifteen minutes count, and each headline alerts once a day.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Local};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::calendar::MarketSession;
use super::signal::{
    apply_price_comparison, calculate_strike_recommendations, filter_strikes_by_price, strength_for,
    SignalDetector,
};
use super::types::{Catalyst, ConfidenceBreakdown, Signal, SignalDirection, ACTIONABLE_CONFIDENCE};
use crate::data::market::MarketData;
use crate::data::news::{CompanyNewsFeed, NewsArticle};
use crate::data::options_history::PriceComparisonChecker;

const NAME: &str = "Live Intraday News";
const DESCRIPTION: &str = "Monitors breaking news in real-time and triggers alerts \
     when high-impact news is detected within the last 15 minutes.";

const LOOKBACK_MINUTES: i64 = 15;

const BULLISH_KEYWORDS: &[&str] = &[
    "beats", "surge", "upgrade", "partnership", "acquisition",
    "record", "growth", "raises guidance", "buy rating", "outperform",
    "s&p inclusion", "s&p 500", "index addition", "strong results",
    "exceeds expectations", "bullish", "rally", "soar",
];

const BEARISH_KEYWORDS: &[&str] = &[
    "misses", "plunge", "downgrade", "lawsuit", "investigation",
    "lowers guidance", "sell rating", "underperform", "layoffs",
    "ceo departure", "cfo leaves", "index removal", "disappoints",
    "weak results", "bearish", "tumble", "crash",
];

const MAJOR_SOURCES: &[&str] = &[
    "reuters", "bloomberg", "cnbc", "wall street journal", "wsj",
    "financial times", "ft", "marketwatch", "barron's", "seeking alpha",
];

#[derive(Debug, Clone, PartialEq)]
struct Reading {
    direction: SignalDirection,
    matched: Vec<&'static str>,
    major_source: bool,
}

impl Reading {
    /// 40 base + 15 per keyword + 10 for a major outlet, in points.
    fn points(&self) -> usize {
        40 + 15 * self.matched.len() + if self.major_source { 10 } else { 0 }
    }

    fn confidence(&self) -> f64 {
        f64::min(self.points() as f64 / 100.0, 1.0)
    }
}

/// Keyword vote over headline and summary; a tie reads as no signal.
fn read_article(article: &NewsArticle) -> Option<Reading> {
    let text = article.text();
    let bullish: Vec<&'static str> = BULLISH_KEYWORDS.iter().copied().filter(|k| text.contains(k)).collect();
    let bearish: Vec<&'static str> = BEARISH_KEYWORDS.iter().copied().filter(|k| text.contains(k)).collect();

    let (direction, matched) = if bullish.len() > bearish.len() {
        (SignalDirection::Call, bullish)
    } else if bearish.len() > bullish.len() {
        (SignalDirection::Put, bearish)
    } else {
        return None;
    };

    let source = article.source.to_lowercase();
    Some(Reading {
        direction,
        matched,
        major_source: MAJOR_SOURCES.iter().any(|s| source.contains(s)),
    })
}

pub struct LiveNewsSignal {
    enabled: bool,
    ticker: String,
    max_option_price: f64,
    session: MarketSession,
    feed: Arc<dyn CompanyNewsFeed>,
    market: Arc<dyn MarketData>,
    prices: Option<Arc<PriceComparisonChecker>>,
    alerted: HashSet<String>,
}

impl LiveNewsSignal {
    pub fn new(
        ticker: &str,
        max_option_price: f64,
        session: MarketSession,
        feed: Arc<dyn CompanyNewsFeed>,
        market: Arc<dyn MarketData>,
        prices: Option<Arc<PriceComparisonChecker>>,
    ) -> Self {
        Self {
            enabled: true,
            ticker: ticker.to_string(),
            max_option_price,
            session,
            feed,
            market,
            prices,
            alerted: HashSet::new(),
        }
    }

    pub fn clear_alert_history(&mut self) {
        self.alerted.clear();
        info!("Live news alert history cleared");
    }
}

#[async_trait]
impl SignalDetector for LiveNewsSignal {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    async fn check(&mut self, now: DateTime<Local>) -> Result<Option<Signal>> {
        if !self.enabled {
            return Ok(None);
        }
        if !self.session.is_trading_day(&now) {
            debug!("Not a valid trading day");
            return Ok(None);
        }
        if !self.session.is_entry_window(&now) {
            debug!("Outside valid entry window");
            return Ok(None);
        }

        let news = self.feed.company_news(&self.ticker, 1, now).await?;
        let cutoff = now - Duration::minutes(LOOKBACK_MINUTES);

        let hit = news
            .into_iter()
            .filter(|a| a.published >= cutoff && !self.alerted.contains(&a.title))
            .find_map(|a| {
                read_article(&a)
                    .filter(|r| r.confidence() >= ACTIONABLE_CONFIDENCE)
                    .map(|r| (a, r))
            });
        let Some((article, reading)) = hit else {
            debug!("No actionable news in last {} minutes", LOOKBACK_MINUTES);
            return Ok(None);
        };
        self.alerted.insert(article.title.clone());

        let price = self.market.get_quote(&self.ticker).await?.price;
        if price <= 0.0 {
            warn!("Could not get {} price", self.ticker);
            return Ok(None);
        }

        let strikes = calculate_strike_recommendations(price, reading.direction);
        let strikes = filter_strikes_by_price(strikes, self.max_option_price);
        let (strikes, boost) = apply_price_comparison(
            self.prices.as_deref(),
            strikes,
            price,
            reading.direction,
            self.session.dte_for(&now),
            now,
        );

        let base = reading.confidence();
        let confidence = f64::min(base + boost, 1.0);

        let mut breakdown = ConfidenceBreakdown::new();
        breakdown.add("Breaking news", 0.4, None);
        breakdown.add(
            format!("Keyword matches ({})", reading.matched.len()),
            0.15 * reading.matched.len() as f64,
            Some(reading.matched.join(", ")),
        );
        if reading.major_source {
            breakdown.add("Major source", 0.1, Some(article.source.clone()));
        }
        if boost > 0.0 {
            breakdown.add("Elevated option prices", boost, Some("above 6-week average".to_string()));
        }

        let signal = Signal {
            name: NAME.to_string(),
            direction: reading.direction,
            strength: strength_for(confidence, 0.8, 0.6),
            confidence,
            timestamp: now,
            current_price: price,
            catalyst: Catalyst::LiveNews {
                minutes_ago: (now - article.published).num_minutes(),
                headline: article.title,
                source: article.source,
                published: article.published,
                news_url: article.url,
                matched_keywords: reading.matched.iter().map(|k| k.to_string()).collect(),
            },
            breakdown,
            recommended_strikes: strikes,
            price_comparison_boost: boost,
        };

        info!("Live news signal detected: {}", signal);
        Ok(Some(signal))
    }

    fn reset_daily(&mut self) {
        self.clear_alert_history();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SignalStrength;
    use crate::data::options_history::{OptionSnapshot, OptionsHistoryDb};
    use crate::testing::{at, FakeMarket, FakeNews};

    fn article(title: &str, source: &str, published: DateTime<Local>) -> NewsArticle {
        NewsArticle::new(title, source, "https://n", published, "", vec!["APP".to_string()])
    }

    fn detector(news: Arc<FakeNews>, prices: Option<Arc<PriceComparisonChecker>>) -> LiveNewsSignal {
        LiveNewsSignal::new(
            "APP",
            1.0,
            MarketSession::default(),
            news,
            Arc::new(FakeMarket::new(300.0, 0.0)),
            prices,
        )
    }

    #[test]
    fn test_reading() {
        let now = at(10, 10, 0);
        let r = read_article(&article("AppLovin beats, raises guidance", "Reuters", now)).unwrap();
        assert_eq!(r.direction, SignalDirection::Call);
        assert_eq!(r.matched, vec!["beats", "raises guidance"]);
        assert!(r.major_source);
        assert_eq!(r.points(), 80);

        let r = read_article(&article("Shares tumble on lawsuit", "Benzinga", now)).unwrap();
        assert_eq!(r.direction, SignalDirection::Put);
        assert!(!r.major_source);
        assert_eq!(r.confidence(), 0.7);

        assert!(read_article(&article("Upgrade meets lawsuit", "", now)).is_none());
    }

    #[tokio::test]
    async fn test_recent_headline_alerts_once() {
        let now = at(9, 11, 0);
        let news = Arc::new(FakeNews::default());
        news.push_company("APP", article("AppLovin beats, raises guidance", "Reuters", now - Duration::minutes(4)));
        let mut d = detector(news, None);

        let signal = d.check(now).await.unwrap().unwrap();
        assert_eq!(signal.direction, SignalDirection::Call);
        assert_eq!(signal.strength, SignalStrength::Strong);
        assert_eq!(signal.breakdown.components.len(), 3);
        match &signal.catalyst {
            Catalyst::LiveNews { minutes_ago, .. } => assert_eq!(*minutes_ago, 4),
            other => panic!("unexpected catalyst {:?}", other),
        }

        assert!(d.check(now).await.unwrap().is_none());
        d.reset_daily();
        assert!(d.check(now).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stale_and_weak_news_skipped() {
        let now = at(9, 11, 0);
        let news = Arc::new(FakeNews::default());
        news.push_company("APP", article("AppLovin beats estimates", "Reuters", now - Duration::minutes(16)));
        // one keyword, minor outlet: 0.55 clears the bar
        news.push_company("APP", article("Analyst says bullish", "Benzinga", now - Duration::minutes(1)));
        let mut d = detector(news, None);

        let signal = d.check(now).await.unwrap().unwrap();
        assert_eq!(signal.catalyst.headline(), Some("Analyst says bullish"));
        assert!((signal.confidence - 0.55).abs() < 1e-9);
        assert_eq!(signal.strength, SignalStrength::Weak);
    }

    #[tokio::test]
    async fn test_entry_window_gate() {
        let news = Arc::new(FakeNews::default());
        let late = at(10, 15, 45);
        news.push_company("APP", article("AppLovin beats", "Reuters", late));
        let mut d = detector(news, None);
        assert!(d.check(late).await.unwrap().is_none());
        assert!(d.check(at(8, 10, 0)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_history_no_boost() {
        let now = at(10, 11, 0);
        let db = Arc::new(OptionsHistoryDb::open_in_memory().unwrap());
        let snapshot = OptionSnapshot {
            timestamp: now - Duration::hours(1),
            symbol: "APP".to_string(),
            stock_price: 300.0,
            expiration_date: now.date_naive(),
            dte: 0,
            option_type: crate::core::types::OptionType::Call,
            strike: 315.0,
            strike_distance: 15.0,
            mid_price: 0.5,
            last_price: 0.5,
            bid: 0.45,
            ask: 0.55,
            volume: 10,
            open_interest: 10,
        };
        db.store_snapshot(&snapshot).unwrap();
        let checker = Arc::new(PriceComparisonChecker::new(db, "APP"));

        let news = Arc::new(FakeNews::default());
        news.push_company("APP", article("AppLovin surge", "CNBC", now));
        let mut d = detector(news, Some(checker));

        let signal = d.check(now).await.unwrap().unwrap();
        // formula strikes carry no premium, so nothing to compare
        assert_eq!(signal.price_comparison_boost, 0.0);
        let cmp = signal.recommended_strikes[0].price_comparison.as_ref().unwrap();
        assert!(cmp.has_historical_data);
        assert!(!cmp.is_elevated);
    }
}
