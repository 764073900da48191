//! Friday 0DTE setup detector
//!
//! On Fridays the nearest weekly expires the same day. A strong opening move
//! backed by open interest or unusual volume on the OTM side of the chain is
//! the setup.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::calendar::MarketSession;
use super::signal::{strength_for, SignalDetector};
use super::types::{Catalyst, ConfidenceBreakdown, OptionType, Signal, SignalDirection, StrikeRecommendation};
use crate::data::market::{MarketData, OptionContract, OptionsChain};

const NAME: &str = "Friday 0DTE Setup";
const DESCRIPTION: &str = "Detects favorable 0DTE option setups on Fridays based on \
     pre-market momentum, unusual volume, and open interest patterns.";

const MOMENTUM_THRESHOLD_PCT: f64 = 2.0;
const VOLUME_RATIO: f64 = 2.0;
const MIN_OPEN_INTEREST: u64 = 100;
const MAX_STRIKES: usize = 3;

/// Outcome of scoring the setup. Confidence is tracked in points (1/100).
#[derive(Debug, Clone)]
struct Setup {
    direction: SignalDirection,
    points: u32,
    breakdown: ConfidenceBreakdown,
    factors: Vec<String>,
}

impl Setup {
    fn add(&mut self, points: u32, name: &str, factor: String) {
        self.points += points;
        self.breakdown.add(name, points as f64 / 100.0, Some(factor.clone()));
        self.factors.push(factor);
    }

    fn confidence(&self) -> f64 {
        f64::min(self.points as f64 / 100.0, 1.0)
    }

    fn is_favorable(&self) -> bool {
        self.points >= 50 && self.direction != SignalDirection::Neutral
    }
}

fn otm_side<'a>(chain: &'a OptionsChain, price: f64, direction: SignalDirection) -> Vec<&'a OptionContract> {
    match direction {
        SignalDirection::Call => chain.otm_calls(price, usize::MAX),
        SignalDirection::Put => chain.otm_puts(price, usize::MAX),
        SignalDirection::Neutral => Vec::new(),
    }
}

fn analyze_setup(
    session: &MarketSession,
    now: &DateTime<Local>,
    price: f64,
    change_pct: f64,
    chain: &OptionsChain,
) -> Setup {
    let direction = if change_pct > MOMENTUM_THRESHOLD_PCT {
        SignalDirection::Call
    } else if change_pct < -MOMENTUM_THRESHOLD_PCT {
        SignalDirection::Put
    } else {
        SignalDirection::Neutral
    };

    let mut setup = Setup {
        direction,
        points: 0,
        breakdown: ConfidenceBreakdown::new(),
        factors: Vec::new(),
    };

    if change_pct.abs() >= MOMENTUM_THRESHOLD_PCT {
        setup.add(30, "Momentum", format!("Strong pre-market momentum: {:+.1}%", change_pct));
    }

    let otm = otm_side(chain, price, direction);
    if !otm.is_empty() {
        let high_oi = otm.iter().filter(|c| c.open_interest >= MIN_OPEN_INTEREST).count();
        if high_oi > 0 {
            setup.add(20, "Open interest", format!("High OI on {} OTM strikes", high_oi));
        }

        let avg_volume = otm.iter().map(|c| c.volume as f64).sum::<f64>() / otm.len() as f64;
        if avg_volume > 0.0 {
            let unusual = otm
                .iter()
                .filter(|c| c.volume as f64 > avg_volume * VOLUME_RATIO)
                .count();
            if unusual > 0 {
                setup.add(20, "Unusual volume", format!("Unusual volume on {} strikes", unusual));
            }
        }
    }

    if session.is_morning_window(now) {
        setup.add(10, "Morning window", "Optimal entry window (morning)".to_string());
    }

    setup.add(20, "0DTE available", "Friday 0DTE expiration available".to_string());
    setup
}

/// Nearest OTM contracts on the signal's side, with their market data.
fn best_strikes(chain: &OptionsChain, price: f64, direction: SignalDirection) -> Vec<StrikeRecommendation> {
    let Some(option_type) = direction.option_type() else {
        return Vec::new();
    };

    otm_side(chain, price, direction)
        .into_iter()
        .take(MAX_STRIKES)
        .map(|c| {
            let distance = match option_type {
                OptionType::Call => c.strike - price,
                OptionType::Put => price - c.strike,
            };
            let otm_pct = (distance / price * 1000.0).round() / 10.0;
            StrikeRecommendation {
                strike: c.strike,
                option_type,
                otm_pct,
                risk: None,
                last_price: Some(c.last_price),
                bid: Some(c.bid),
                ask: Some(c.ask),
                volume: Some(c.volume),
                open_interest: Some(c.open_interest),
                implied_volatility: Some(c.implied_volatility),
                price_comparison: None,
            }
        })
        .collect()
}

pub struct Friday0DteSignal {
    enabled: bool,
    ticker: String,
    session: MarketSession,
    market: Arc<dyn MarketData>,
}

impl Friday0DteSignal {
    pub fn new(ticker: &str, session: MarketSession, market: Arc<dyn MarketData>) -> Self {
        Self {
            enabled: true,
            ticker: ticker.to_string(),
            session,
            market,
        }
    }
}

#[async_trait]
impl SignalDetector for Friday0DteSignal {
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
        if !self.session.is_friday(&now) {
            debug!("Not Friday - skipping 0DTE check");
            return Ok(None);
        }

        let quote = self.market.get_quote(&self.ticker).await?;
        if quote.price <= 0.0 {
            warn!("Could not get {} price", self.ticker);
            return Ok(None);
        }

        let chain = self.market.get_options_chain(&self.ticker, None).await?;
        if chain.is_empty() {
            warn!("Could not get options chain for {}", self.ticker);
            return Ok(None);
        }

        let setup = analyze_setup(&self.session, &now, quote.price, quote.change_pct, &chain);
        if !setup.is_favorable() {
            debug!("No favorable 0DTE setup detected");
            return Ok(None);
        }

        let confidence = setup.confidence();
        let signal = Signal {
            name: NAME.to_string(),
            direction: setup.direction,
            strength: strength_for(confidence, 0.7, 0.5),
            confidence,
            timestamp: now,
            current_price: quote.price,
            recommended_strikes: best_strikes(&chain, quote.price, setup.direction),
            catalyst: Catalyst::Friday0Dte {
                premarket_move: quote.change_pct,
                expiration: chain.expiration.map(|d| d.format("%Y-%m-%d").to_string()),
                setup_factors: setup.factors,
            },
            breakdown: setup.breakdown,
            price_comparison_boost: 0.0,
        };

        info!("Friday 0DTE signal detected: {}", signal);
        Ok(Some(signal))
    }
}
