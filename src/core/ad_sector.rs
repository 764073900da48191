//! Ad sector news detector
//!
//! Breaking, relevant news about the watched ticker's peers and the digital
//! advertising market, with a directional sentiment, is a catalyst.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::calendar::MarketSession;
use super::signal::{apply_price_comparison, calculate_strike_recommendations, strength_for, SignalDetector};
use super::types::{Catalyst, ConfidenceBreakdown, Sentiment, Signal};
use crate::data::market::MarketData;
use crate::data::news::NewsAggregator;
use crate::data::options_history::PriceComparisonChecker;

const NAME: &str = "Ad Sector News";
const DESCRIPTION: &str = "Monitors news from ad-tech peers and the digital advertising industry. \
     Triggers when high-relevance news with strong sentiment is detected.";

/// Sentiment mix across recent relevant sector news
#[derive(Debug, Clone, PartialEq)]
pub struct SectorSentiment {
    pub bullish: usize,
    pub bearish: usize,
    pub neutral: usize,
    pub overall: Sentiment,
    pub article_count: usize,
}

pub struct AdSectorSignal {
    enabled: bool,
    ticker: String,
    session: MarketSession,
    news: Arc<NewsAggregator>,
    market: Arc<dyn MarketData>,
    prices: Option<Arc<PriceComparisonChecker>>,
}

impl AdSectorSignal {
    pub fn new(
        ticker: &str,
        session: MarketSession,
        news: Arc<NewsAggregator>,
        market: Arc<dyn MarketData>,
        prices: Option<Arc<PriceComparisonChecker>>,
    ) -> Self {
        Self {
            enabled: true,
            ticker: ticker.to_string(),
            session,
            news,
            market,
            prices,
        }
    }

    /// Overall lean is bullish or bearish when its share beats the other by
    /// more than twenty points.
    pub async fn sector_sentiment(&self, now: DateTime<Local>) -> SectorSentiment {
        let news = self.news.ad_sector_news(now).await;

        let count = |s: Sentiment| news.iter().filter(|a| a.sentiment == s).count();
        let bullish = count(Sentiment::Bullish);
        let bearish = count(Sentiment::Bearish);
        let neutral = count(Sentiment::Neutral);
        let total = news.len();

        let overall = if total == 0 {
            Sentiment::Neutral
        } else {
            let bull_pct = bullish as f64 / total as f64;
            let bear_pct = bearish as f64 / total as f64;
            if bull_pct > bear_pct + 0.2 {
                Sentiment::Bullish
            } else if bear_pct > bull_pct + 0.2 {
                Sentiment::Bearish
            } else {
                Sentiment::Neutral
            }
        };

        SectorSentiment {
            bullish,
            bearish,
            neutral,
            overall,
            article_count: total,
        }
    }
}

#[async_trait]
impl SignalDetector for AdSectorSignal {
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

        let Some(catalyst) = self.news.check_for_catalyst(now).await else {
            debug!("No ad sector catalyst detected");
            return Ok(None);
        };

        let price = self.market.get_quote(&self.ticker).await?.price;
        if price <= 0.0 {
            warn!("Could not get {} price for strike recommendations", self.ticker);
            return Ok(None);
        }

        let direction = catalyst.sentiment.direction();
        let base = f64::min(catalyst.relevance * 1.2, 1.0);

        let strikes = calculate_strike_recommendations(price, direction);
        let (strikes, boost) = apply_price_comparison(
            self.prices.as_deref(),
            strikes,
            price,
            direction,
            self.session.dte_for(&now),
            now,
        );
        let confidence = f64::min(base + boost, 1.0);

        let mut breakdown = ConfidenceBreakdown::new();
        breakdown.add(
            "News relevance",
            base,
            Some(format!("{:.0}% relevance x 1.2", catalyst.relevance * 100.0)),
        );
        if boost > 0.0 {
            breakdown.add("Elevated option prices", boost, Some("above 6-week average".to_string()));
        }

        let signal = Signal {
            name: NAME.to_string(),
            direction,
            strength: strength_for(confidence, 0.7, 0.5),
            confidence,
            timestamp: now,
            current_price: price,
            catalyst: Catalyst::AdSectorNews {
                headline: catalyst.title,
                source: catalyst.source,
                sentiment: catalyst.sentiment,
                relevance_score: catalyst.relevance,
                news_url: catalyst.url,
            },
            breakdown,
            recommended_strikes: strikes,
            price_comparison_boost: boost,
        };

        info!("Ad sector signal detected: {}", signal);
        Ok(Some(signal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatchConfig;
    use crate::core::types::{SignalDirection, SignalStrength};
    use crate::data::news::NewsArticle;
    use crate::testing::{at, FakeMarket, FakeNews};
    use chrono::Duration;

    fn detector(news: Arc<FakeNews>, market: Arc<FakeMarket>) -> AdSectorSignal {
        let agg = Arc::new(NewsAggregator::new(news.clone(), news, &WatchConfig::default()));
        AdSectorSignal::new("APP", MarketSession::default(), agg, market, None)
    }

    #[tokio::test]
    async fn test_bullish_catalyst_signals_calls() {
        let now = at(9, 10, 0);
        let news = Arc::new(FakeNews::default());
        news.push_company(
            "APP",
            NewsArticle::new("AppLovin shares surge", "CNBC", "u", now - Duration::minutes(10), "", vec![]),
        );
        let mut d = detector(news, Arc::new(FakeMarket::new(300.0, 1.0)));

        let signal = d.check(now).await.unwrap().unwrap();
        assert_eq!(signal.direction, SignalDirection::Call);
        assert_eq!(signal.confidence, 1.0);
        assert_eq!(signal.strength, SignalStrength::Strong);
        assert_eq!(signal.recommended_strikes[0].strike, 315.0);
        assert_eq!(signal.catalyst.headline(), Some("AppLovin shares surge"));
        assert!(signal.is_actionable());
    }

    #[tokio::test]
    async fn test_peer_news_scales_confidence() {
        let now = at(10, 11, 0);
        let news = Arc::new(FakeNews::default());
        news.push_company(
            "META",
            NewsArticle::new("Meta ad revenue falls", "WSJ", "u", now - Duration::minutes(5), "", vec!["META".to_string()]),
        );
        let mut d = detector(news, Arc::new(FakeMarket::new(300.0, -1.0)));

        let signal = d.check(now).await.unwrap().unwrap();
        assert_eq!(signal.direction, SignalDirection::Put);
        assert!((signal.confidence - 0.6).abs() < 1e-9);
        assert_eq!(signal.strength, SignalStrength::Moderate);
        assert_eq!(signal.breakdown.components.len(), 1);
    }

    #[tokio::test]
    async fn test_gates() {
        let news = Arc::new(FakeNews::default());
        let wed = at(8, 10, 0);
        news.push_company("APP", NewsArticle::new("AppLovin shares surge", "", "", wed, "", vec![]));
        let mut d = detector(news, Arc::new(FakeMarket::new(300.0, 1.0)));
        assert!(d.check(wed).await.unwrap().is_none());

        d.set_enabled(false);
        assert!(d.check(at(9, 10, 0)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_price_no_signal() {
        let now = at(9, 10, 0);
        let news = Arc::new(FakeNews::default());
        news.push_company("APP", NewsArticle::new("AppLovin shares surge", "", "", now, "", vec![]));
        let mut d = detector(news, Arc::new(FakeMarket::new(0.0, 0.0)));
        assert!(d.check(now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sector_sentiment() {
        let now = at(9, 10, 0);
        let news = Arc::new(FakeNews::default());
        for title in ["AppLovin surges", "AppLovin record quarter", "AppLovin annual meeting"] {
            news.push_company("APP", NewsArticle::new(title, "", "", now, "", vec![]));
        }
        let d = detector(news, Arc::new(FakeMarket::new(300.0, 0.0)));
        let mix = d.sector_sentiment(now).await;
        assert_eq!(mix.bullish, 2);
        assert_eq!(mix.neutral, 1);
        assert_eq!(mix.overall, Sentiment::Bullish);
        assert_eq!(mix.article_count, 3);
    }
}
