//! Yahoo Finance market data
//!
//! Public chart and option-chain endpoints. Parsing is kept in free
//! functions so payloads can be checked without the network.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::market::{Bar, MarketData, OptionContract, OptionsChain, Quote};

const BASE_URL: &str = "https://query1.finance.yahoo.com";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) options-catalyst/0.1";

pub struct YahooClient {
    base_url: String,
    client: reqwest::Client,
}

impl YahooClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn fetch_chart(&self, symbol: &str, range: &str, interval: &str) -> Result<ChartResult> {
        let resp = self
            .client
            .get(format!("{}/v8/finance/chart/{}", self.base_url, symbol))
            .query(&[("range", range), ("interval", interval)])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(anyhow!("chart request for {} failed: {}", symbol, resp.status()));
        }
        let body = resp.text().await?;
        parse_chart(&body)
    }

    async fn fetch_options(&self, symbol: &str, date: Option<i64>) -> Result<OptionsChain> {
        let mut req = self
            .client
            .get(format!("{}/v7/finance/options/{}", self.base_url, symbol));
        if let Some(ts) = date {
            req = req.query(&[("date", ts.to_string())]);
        }
        let resp = req.send().await?;

        if !resp.status().is_success() {
            return Err(anyhow!("options request for {} failed: {}", symbol, resp.status()));
        }
        let body = resp.text().await?;
        parse_options(&body)
    }
}

#[async_trait]
impl MarketData for YahooClient {
    async fn get_quote(&self, symbol: &str) -> Result<Quote> {
        let chart = self.fetch_chart(symbol, "1d", "1d").await?;
        quote_from_chart(symbol, &chart)
    }

    async fn get_options_chain(&self, symbol: &str, expiration: Option<NaiveDate>) -> Result<OptionsChain> {
        let nearest = self.fetch_options(symbol, None).await?;

        match expiration {
            Some(exp) if nearest.expiration != Some(exp) && nearest.expirations.contains(&exp) => {
                debug!("Fetching {} chain for {}", symbol, exp);
                let ts = exp
                    .and_hms_opt(0, 0, 0)
                    .map(|dt| dt.and_utc().timestamp())
                    .ok_or_else(|| anyhow!("invalid expiration {}", exp))?;
                let mut chain = self.fetch_options(symbol, Some(ts)).await?;
                if chain.expirations.is_empty() {
                    chain.expirations = nearest.expirations;
                }
                Ok(chain)
            }
            _ => Ok(nearest),
        }
    }

    async fn get_history(&self, symbol: &str, range: &str, interval: &str) -> Result<Vec<Bar>> {
        let chart = self.fetch_chart(symbol, range, interval).await?;
        Ok(bars_from_chart(&chart))
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    chart_previous_close: Option<f64>,
    previous_close: Option<f64>,
    regular_market_volume: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

pub fn parse_chart(body: &str) -> Result<ChartResult> {
    let env: ChartEnvelope = serde_json::from_str(body)?;
    if let Some(err) = env.chart.error.filter(|e| !e.is_null()) {
        return Err(anyhow!("chart error: {}", err));
    }
    env.chart
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
        .ok_or_else(|| anyhow!("chart response had no result"))
}

pub fn quote_from_chart(symbol: &str, chart: &ChartResult) -> Result<Quote> {
    let price = chart
        .meta
        .regular_market_price
        .or_else(|| {
            chart
                .indicators
                .quote
                .first()
                .and_then(|q| q.close.iter().rev().flatten().next().copied())
        })
        .ok_or_else(|| anyhow!("no price for {}", symbol))?;
    let prev = chart.meta.previous_close.or(chart.meta.chart_previous_close);
    let volume = chart.meta.regular_market_volume.unwrap_or(0);
    Ok(Quote::from_prices(symbol, price, prev, volume))
}

/// Bars with any missing OHLC field are skipped.
pub fn bars_from_chart(chart: &ChartResult) -> Vec<Bar> {
    let Some(q) = chart.indicators.quote.first() else {
        return Vec::new();
    };

    chart
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let open = (*q.open.get(i)?)?;
            let high = (*q.high.get(i)?)?;
            let low = (*q.low.get(i)?)?;
            let close = (*q.close.get(i)?)?;
            let volume = q.volume.get(i).copied().flatten().unwrap_or(0);
            let time = DateTime::<Utc>::from_timestamp(*ts, 0)?.with_timezone(&Local);
            Some(Bar { time, open, high, low, close, volume })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionsEnvelope {
    option_chain: OptionsBody,
}

#[derive(Debug, Deserialize)]
struct OptionsBody {
    #[serde(default)]
    result: Vec<OptionsResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionsResult {
    #[serde(default)]
    expiration_dates: Vec<i64>,
    #[serde(default)]
    options: Vec<OptionsSet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionsSet {
    expiration_date: Option<i64>,
    #[serde(default)]
    calls: Vec<RawContract>,
    #[serde(default)]
    puts: Vec<RawContract>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContract {
    strike: f64,
    #[serde(default)]
    last_price: Option<f64>,
    #[serde(default)]
    bid: Option<f64>,
    #[serde(default)]
    ask: Option<f64>,
    #[serde(default)]
    volume: Option<u64>,
    #[serde(default)]
    open_interest: Option<u64>,
    #[serde(default)]
    implied_volatility: Option<f64>,
}

impl From<RawContract> for OptionContract {
    fn from(raw: RawContract) -> Self {
        Self {
            strike: raw.strike,
            last_price: raw.last_price.unwrap_or(0.0),
            bid: raw.bid.unwrap_or(0.0),
            ask: raw.ask.unwrap_or(0.0),
            volume: raw.volume.unwrap_or(0),
            open_interest: raw.open_interest.unwrap_or(0),
            implied_volatility: raw.implied_volatility.unwrap_or(0.0),
        }
    }
}

fn unix_date(ts: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp(ts, 0).map(|dt| dt.date_naive())
}

pub fn parse_options(body: &str) -> Result<OptionsChain> {
    let env: OptionsEnvelope = serde_json::from_str(body)?;
    let Some(result) = env.option_chain.result.into_iter().next() else {
        return Ok(OptionsChain::default());
    };

    let expirations: Vec<NaiveDate> = result
        .expiration_dates
        .iter()
        .filter_map(|ts| unix_date(*ts))
        .collect();

    let mut chain = OptionsChain {
        expirations,
        ..Default::default()
    };

    if let Some(set) = result.options.into_iter().next() {
        chain.expiration = set.expiration_date.and_then(unix_date);
        chain.calls = set.calls.into_iter().map(OptionContract::from).collect();
        chain.puts = set.puts.into_iter().map(OptionContract::from).collect();
    }
    chain.sort_by_strike();
    Ok(chain)
}
