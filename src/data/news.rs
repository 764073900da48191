//! News monitoring
//!
//! Pulls company and sector news from Finnhub and NewsAPI, scores keyword
//! sentiment and relevance to the watched ticker, and aggregates it for the
//! sector catalyst detector.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, Utc};
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use tracing::{error, warn};

use crate::config::WatchConfig;
use crate::core::types::Sentiment;

const FINNHUB_URL: &str = "https://finnhub.io/api/v1";
const NEWSAPI_URL: &str = "https://newsapi.org/v2";
const MAX_ARTICLES: usize = 20;
const CACHE_TTL_SECS: i64 = 300;

const BULLISH_KEYWORDS: &[&str] = &[
    "beats", "surge", "soar", "jump", "rally", "upgrade",
    "growth", "record", "strong", "exceeds", "outperform",
];

const BEARISH_KEYWORDS: &[&str] = &[
    "miss", "plunge", "drop", "fall", "downgrade", "weak",
    "decline", "cut", "lower", "disappoints", "underperform",
];

/// Default cutoff for `NewsArticle::is_relevant`.
pub const RELEVANCE_THRESHOLD: f64 = 0.3;

/// What counts as relevant news for the watched ticker
#[derive(Debug, Clone)]
pub struct WatchProfile {
    pub ticker: String,
    pub company: String,
    pub sector_tickers: Vec<String>,
    pub sector_keywords: Vec<String>,
}

impl WatchProfile {
    pub fn from_config(cfg: &WatchConfig) -> Self {
        Self {
            ticker: cfg.ticker.clone(),
            company: cfg.company.to_lowercase(),
            sector_tickers: cfg.sector_tickers.clone(),
            sector_keywords: cfg.sector_keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewsArticle {
    pub title: String,
    pub source: String,
    pub url: String,
    pub published: DateTime<Local>,
    pub summary: String,
    pub tickers: Vec<String>,
    pub sentiment: Sentiment,
}

impl NewsArticle {
    pub fn new(
        title: impl Into<String>,
        source: impl Into<String>,
        url: impl Into<String>,
        published: DateTime<Local>,
        summary: impl Into<String>,
        tickers: Vec<String>,
    ) -> Self {
        let title = title.into();
        let summary = summary.into();
        let sentiment = keyword_sentiment(&format!("{} {}", title, summary));
        Self {
            title,
            source: source.into(),
            url: url.into(),
            published,
            summary,
            tickers,
            sentiment,
        }
    }

    /// Lowercased headline and summary, the text every keyword scan runs on.
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.summary).to_lowercase()
    }

    pub fn relevance(&self, profile: &WatchProfile) -> f64 {
        let text = self.text();
        let mut score = 0.0;

        if (!profile.company.is_empty() && text.contains(&profile.company))
            || self.tickers.iter().any(|t| *t == profile.ticker)
        {
            score += 1.0;
        }

        for keyword in &profile.sector_keywords {
            if text.contains(keyword.as_str()) {
                score += 0.2;
            }
        }

        for ticker in &self.tickers {
            if profile.sector_tickers.contains(ticker) {
                score += 0.3;
            }
        }

        f64::min(score, 1.0)
    }

    pub fn is_relevant(&self, profile: &WatchProfile, threshold: f64) -> bool {
        self.relevance(profile) >= threshold
    }
}

fn keyword_sentiment(text: &str) -> Sentiment {
    let text = text.to_lowercase();
    let bullish = BULLISH_KEYWORDS.iter().filter(|kw| text.contains(*kw)).count();
    let bearish = BEARISH_KEYWORDS.iter().filter(|kw| text.contains(*kw)).count();

    if bullish > bearish {
        Sentiment::Bullish
    } else if bearish > bullish {
        Sentiment::Bearish
    } else {
        Sentiment::Neutral
    }
}

/// Company-tagged news for a symbol
#[async_trait]
pub trait CompanyNewsFeed: Send + Sync {
    async fn company_news(&self, symbol: &str, days: i64, now: DateTime<Local>) -> Result<Vec<NewsArticle>>;
}

/// Free-text news search
#[async_trait]
pub trait NewsSearch: Send + Sync {
    async fn search_news(&self, query: &str, days: i64, now: DateTime<Local>) -> Result<Vec<NewsArticle>>;
}

pub struct FinnhubNews {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl FinnhubNews {
    pub fn new(api_key: Option<String>) -> Self {
        let api_key = api_key.filter(|k| !k.is_empty());
        if api_key.is_none() {
            warn!("Finnhub API key not found. News monitoring disabled.");
        }
        Self {
            api_key,
            base_url: FINNHUB_URL.to_string(),
            client: http_client(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// General market headlines, at most twenty.
    pub async fn market_news(&self, category: &str) -> Result<Vec<NewsArticle>> {
        let Some(key) = &self.api_key else {
            return Ok(Vec::new());
        };

        let resp = self
            .client
            .get(format!("{}/news", self.base_url))
            .query(&[("category", category), ("token", key.as_str())])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(anyhow!("Finnhub market news failed: {}", resp.status()));
        }
        let body = resp.text().await?;
        parse_market_news(&body)
    }
}

#[async_trait]
impl CompanyNewsFeed for FinnhubNews {
    async fn company_news(&self, symbol: &str, days: i64, now: DateTime<Local>) -> Result<Vec<NewsArticle>> {
        let Some(key) = &self.api_key else {
            return Ok(Vec::new());
        };

        let from = (now - Duration::days(days)).format("%Y-%m-%d").to_string();
        let to = now.format("%Y-%m-%d").to_string();

        let resp = self
            .client
            .get(format!("{}/company-news", self.base_url))
            .query(&[
                ("symbol", symbol),
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("token", key.as_str()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(anyhow!("Finnhub company news for {} failed: {}", symbol, resp.status()));
        }
        let body = resp.text().await?;
        parse_finnhub(&body, Some(symbol))
    }
}

#[derive(Debug, Deserialize)]
struct FinnhubItem {
    #[serde(default)]
    headline: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    datetime: i64,
    #[serde(default)]
    summary: String,
}

/// General market headlines carry no ticker tags; only the first twenty
/// are kept.
pub fn parse_market_news(body: &str) -> Result<Vec<NewsArticle>> {
    let mut articles = parse_finnhub(body, None)?;
    articles.truncate(MAX_ARTICLES);
    Ok(articles)
}

/// Finnhub returns a bare array; company news is tagged with its symbol.
pub fn parse_finnhub(body: &str, symbol: Option<&str>) -> Result<Vec<NewsArticle>> {
    let items: Vec<FinnhubItem> = serde_json::from_str(body)?;
    let tickers: Vec<String> = symbol.map(|s| vec![s.to_string()]).unwrap_or_default();

    Ok(items
        .into_iter()
        .map(|item| {
            let published = DateTime::<Utc>::from_timestamp(item.datetime, 0)
                .unwrap_or_default()
                .with_timezone(&Local);
            NewsArticle::new(
                item.headline,
                item.source,
                item.url,
                published,
                item.summary,
                tickers.clone(),
            )
        })
        .collect())
}

pub struct NewsApi {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl NewsApi {
    pub fn new(api_key: Option<String>) -> Self {
        let api_key = api_key.filter(|k| !k.is_empty());
        if api_key.is_none() {
            warn!("NewsAPI key not found. Backup news monitoring disabled.");
        }
        Self {
            api_key,
            base_url: NEWSAPI_URL.to_string(),
            client: http_client(),
        }
    }
}

#[async_trait]
impl NewsSearch for NewsApi {
    async fn search_news(&self, query: &str, days: i64, now: DateTime<Local>) -> Result<Vec<NewsArticle>> {
        let Some(key) = &self.api_key else {
            return Ok(Vec::new());
        };

        let from = (now - Duration::days(days)).format("%Y-%m-%d").to_string();
        let to = now.format("%Y-%m-%d").to_string();

        let resp = self
            .client
            .get(format!("{}/everything", self.base_url))
            .query(&[
                ("q", query),
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("language", "en"),
                ("sortBy", "publishedAt"),
                ("apiKey", key.as_str()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(anyhow!("NewsAPI search for '{}' failed: {}", query, resp.status()));
        }
        let body = resp.text().await?;
        parse_newsapi(&body, now)
    }
}

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    #[serde(default)]
    articles: Vec<NewsApiItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsApiItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    source: Option<NewsApiSource>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsApiSource {
    #[serde(default)]
    name: Option<String>,
}

/// Articles without a parseable `publishedAt` are stamped `now`.
pub fn parse_newsapi(body: &str, now: DateTime<Local>) -> Result<Vec<NewsArticle>> {
    let resp: NewsApiResponse = serde_json::from_str(body)?;

    Ok(resp
        .articles
        .into_iter()
        .take(MAX_ARTICLES)
        .map(|item| {
            let published = item
                .published_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Local))
                .unwrap_or(now);
            NewsArticle::new(
                item.title.unwrap_or_default(),
                item.source.and_then(|s| s.name).unwrap_or_default(),
                item.url.unwrap_or_default(),
                published,
                item.description.unwrap_or_default(),
                Vec::new(),
            )
        })
        .collect())
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .unwrap_or_default()
}

/// A sector catalyst found in breaking news
#[derive(Debug, Clone, PartialEq)]
pub struct SectorCatalyst {
    pub title: String,
    pub source: String,
    pub sentiment: Sentiment,
    pub relevance: f64,
    pub url: String,
    pub published: DateTime<Local>,
}

/// Aggregates news from every source and filters it for relevance
pub struct NewsAggregator {
    company_feed: Arc<dyn CompanyNewsFeed>,
    search: Arc<dyn NewsSearch>,
    profile: WatchProfile,
    news_tickers: Vec<String>,
    sector_query: String,
    cache: Mutex<Option<(DateTime<Local>, Vec<NewsArticle>)>>,
}

impl NewsAggregator {
    pub fn new(
        company_feed: Arc<dyn CompanyNewsFeed>,
        search: Arc<dyn NewsSearch>,
        watch: &WatchConfig,
    ) -> Self {
        Self {
            company_feed,
            search,
            profile: WatchProfile::from_config(watch),
            news_tickers: watch.news_tickers.clone(),
            sector_query: watch.sector_query.clone(),
            cache: Mutex::new(None),
        }
    }

    pub fn profile(&self) -> &WatchProfile {
        &self.profile
    }

    /// Relevant ticker, peer and sector news, deduplicated by title and
    /// sorted by relevance then recency. Cached for five minutes.
    pub async fn ad_sector_news(&self, now: DateTime<Local>) -> Vec<NewsArticle> {
        if let Ok(cache) = self.cache.lock() {
            if let Some((at, articles)) = cache.as_ref() {
                if (now - *at).num_seconds() < CACHE_TTL_SECS && now >= *at {
                    return articles.clone();
                }
            }
        }

        let mut all = Vec::new();

        let mut symbols = vec![self.profile.ticker.clone()];
        symbols.extend(self.news_tickers.iter().cloned());
        for symbol in &symbols {
            match self.company_feed.company_news(symbol, 1, now).await {
                Ok(articles) => all.extend(articles),
                Err(e) => error!("Error fetching news for {}: {}", symbol, e),
            }
        }

        match self.search.search_news(&self.sector_query, 1, now).await {
            Ok(articles) => all.extend(articles),
            Err(e) => error!("Error searching news for '{}': {}", self.sector_query, e),
        }

        let mut seen = std::collections::HashSet::new();
        let mut scored: Vec<(f64, NewsArticle)> = all
            .into_iter()
            .filter(|a| a.is_relevant(&self.profile, RELEVANCE_THRESHOLD))
            .filter(|a| seen.insert(a.title.clone()))
            .map(|a| (a.relevance(&self.profile), a))
            .collect();

        scored.sort_by(|(ra, a), (rb, b)| {
            rb.total_cmp(ra).then_with(|| b.published.cmp(&a.published))
        });
        let articles: Vec<NewsArticle> = scored.into_iter().map(|(_, a)| a).collect();

        if let Ok(mut cache) = self.cache.lock() {
            *cache = Some((now, articles.clone()));
        }
        articles
    }

    pub async fn breaking_news(&self, now: DateTime<Local>, since_minutes: i64) -> Vec<NewsArticle> {
        let cutoff = now - Duration::minutes(since_minutes);
        self.ad_sector_news(now)
            .await
            .into_iter()
            .filter(|a| a.published >= cutoff)
            .collect()
    }

    /// First breaking (last hour) article with relevance ≥ 0.5 and a
    /// directional sentiment.
    pub async fn check_for_catalyst(&self, now: DateTime<Local>) -> Option<SectorCatalyst> {
        self.breaking_news(now, 60)
            .await
            .into_iter()
            .find_map(|a| {
                let relevance = a.relevance(&self.profile);
                if relevance >= 0.5 && a.sentiment != Sentiment::Neutral {
                    Some(SectorCatalyst {
                        title: a.title,
                        source: a.source,
                        sentiment: a.sentiment,
                        relevance,
                        url: a.url,
                        published: a.published,
                    })
                } else {
                    None
                }
            })
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            *cache = None;
        }
    }
}
