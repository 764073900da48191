//! Company news detector
//!
//! Direct news on the watched ticker: index changes, deals, earnings and
//! analyst actions.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Local};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::calendar::MarketSession;
use super::signal::{calculate_strike_recommendations, strength_for, SignalDetector};
use super::types::{Catalyst, ConfidenceBreakdown, Signal, SignalDirection};
use crate::data::market::MarketData;
use crate::data::news::{CompanyNewsFeed, NewsArticle};

const NAME: &str = "Company News";
const DESCRIPTION: &str = "Monitors ticker-specific news for major announcements including \
     S&P index changes, partnerships, earnings, and analyst ratings.";

const LOOKBACK_MINUTES: i64 = 120;

const MAJOR_POSITIVE_KEYWORDS: &[&str] = &[
    "s&p 500", "s&p500", "index inclusion", "acquisition", "acquires",
    "partnership", "contract", "beats estimates", "raises guidance",
    "record revenue", "upgrade", "buy rating", "outperform",
];

const MAJOR_NEGATIVE_KEYWORDS: &[&str] = &[
    "index removal", "lawsuit", "sec investigation", "downgrade",
    "misses estimates", "lowers guidance", "sell rating", "underperform",
    "executive departure", "cfo resignation", "ceo leaves",
];

/// A headline that clears the keyword bar
#[derive(Debug, Clone)]
struct MajorNews {
    article: NewsArticle,
    direction: SignalDirection,
    matched: Vec<&'static str>,
}

impl MajorNews {
    fn impact(&self) -> f64 {
        f64::min((50 + 15 * self.matched.len()) as f64 / 100.0, 1.0)
    }
}

fn matches(text: &str, keywords: &[&'static str]) -> Vec<&'static str> {
    keywords.iter().copied().filter(|kw| text.contains(kw)).collect()
}

/// Positive keywords win when an article carries both.
fn classify(article: &NewsArticle) -> Option<MajorNews> {
    let text = article.text();

    let positive = matches(&text, MAJOR_POSITIVE_KEYWORDS);
    if !positive.is_empty() {
        return Some(MajorNews {
            article: article.clone(),
            direction: SignalDirection::Call,
            matched: positive,
        });
    }

    let negative = matches(&text, MAJOR_NEGATIVE_KEYWORDS);
    if !negative.is_empty() {
        return Some(MajorNews {
            article: article.clone(),
            direction: SignalDirection::Put,
            matched: negative,
        });
    }
    None
}

pub struct CompanyNewsSignal {
    enabled: bool,
    ticker: String,
    session: MarketSession,
    feed: Arc<dyn CompanyNewsFeed>,
    market: Arc<dyn MarketData>,
    alerted: HashSet<String>,
}

impl CompanyNewsSignal {
    pub fn new(
        ticker: &str,
        session: MarketSession,
        feed: Arc<dyn CompanyNewsFeed>,
        market: Arc<dyn MarketData>,
    ) -> Self {
        Self {
            enabled: true,
            ticker: ticker.to_string(),
            session,
            feed,
            market,
            alerted: HashSet::new(),
        }
    }
}

#[async_trait]
impl SignalDetector for CompanyNewsSignal {
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

        let news = self.feed.company_news(&self.ticker, 1, now).await?;
        let cutoff = now - Duration::minutes(LOOKBACK_MINUTES);

        let major = news
            .iter()
            .filter(|a| a.published >= cutoff && !self.alerted.contains(&a.title))
            .find_map(classify);
        let Some(major) = major else {
            debug!("No major {} news catalyst detected", self.ticker);
            return Ok(None);
        };

        let price = self.market.get_quote(&self.ticker).await?.price;
        if price <= 0.0 {
            warn!("Could not get {} price", self.ticker);
            return Ok(None);
        }
        self.alerted.insert(major.article.title.clone());

        let confidence = major.impact();
        let mut breakdown = ConfidenceBreakdown::new();
        breakdown.add("Major company news", 0.5, None);
        breakdown.add(
            format!("Keyword matches ({})", major.matched.len()),
            0.15 * major.matched.len() as f64,
            Some(major.matched.join(", ")),
        );

        let signal = Signal {
            name: NAME.to_string(),
            direction: major.direction,
            strength: strength_for(confidence, 0.8, 0.6),
            confidence,
            timestamp: now,
            current_price: price,
            recommended_strikes: calculate_strike_recommendations(price, major.direction),
            catalyst: Catalyst::CompanyNews {
                headline: major.article.title,
                source: major.article.source,
                published: major.article.published,
                impact_score: confidence,
                news_url: major.article.url,
            },
            breakdown,
            price_comparison_boost: 0.0,
        };

        info!("Company news signal detected: {}", signal);
        Ok(Some(signal))
    }

    fn reset_daily(&mut self) {
        self.alerted.clear();
    }
}
