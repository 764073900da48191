//! Signal detector contract
//!
//! Every detector implements `SignalDetector`. The helpers here are the
//! pieces the detectors share: strength bucketing, standard OTM strike
//! suggestions and the premium filters.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::types::{RiskLevel, Signal, SignalDirection, SignalStrength, StrikeRecommendation};
use crate::data::options_history::PriceComparisonChecker;

/// Detector trait - the alert system polls each one on its schedule
#[async_trait]
pub trait SignalDetector: Send + Sync {
    fn name(&self) -> &str;

    /// What this detector looks for, for the startup banner
    fn description(&self) -> &str;

    fn is_enabled(&self) -> bool;

    fn set_enabled(&mut self, enabled: bool);

    /// Look for a signal as of `now`. `Ok(None)` means nothing to report.
    async fn check(&mut self, now: DateTime<Local>) -> Result<Option<Signal>>;

    /// Forget per-day state (alerted headlines and the like)
    fn reset_daily(&mut self) {}
}

pub fn strength_for(confidence: f64, strong: f64, moderate: f64) -> SignalStrength {
    if confidence >= strong {
        SignalStrength::Strong
    } else if confidence >= moderate {
        SignalStrength::Moderate
    } else {
        SignalStrength::Weak
    }
}

fn round_strike(value: f64) -> f64 {
    Decimal::from_f64(value)
        .map(|d| d.round())
        .and_then(|d| d.to_f64())
        .unwrap_or_else(|| value.round())
}

/// 5% and 10% OTM strikes, rounded to whole dollars.
pub fn calculate_strike_recommendations(price: f64, direction: SignalDirection) -> Vec<StrikeRecommendation> {
    let Some(option_type) = direction.option_type() else {
        return Vec::new();
    };

    let (near, far) = match direction {
        SignalDirection::Call => (dec!(1.05), dec!(1.10)),
        _ => (dec!(0.95), dec!(0.90)),
    };
    let price_dec = Decimal::from_f64(price).unwrap_or_default();
    let at = |mult: Decimal| round_strike((price_dec * mult).to_f64().unwrap_or(0.0));

    vec![
        StrikeRecommendation::new(at(near), option_type, 5.0, RiskLevel::Moderate),
        StrikeRecommendation::new(at(far), option_type, 10.0, RiskLevel::High),
    ]
}

/// Drop strikes whose known premium exceeds `max_price`. Strikes without
/// price data are kept.
pub fn filter_strikes_by_price(strikes: Vec<StrikeRecommendation>, max_price: f64) -> Vec<StrikeRecommendation> {
    strikes
        .into_iter()
        .filter(|s| s.option_price().map_or(true, |p| p <= max_price))
        .collect()
}

/// Run the strikes through the history checker when one is wired in.
pub fn apply_price_comparison(
    checker: Option<&PriceComparisonChecker>,
    strikes: Vec<StrikeRecommendation>,
    stock_price: f64,
    direction: SignalDirection,
    dte: u32,
    now: DateTime<Local>,
) -> (Vec<StrikeRecommendation>, f64) {
    match (checker, direction.option_type()) {
        (Some(checker), Some(option_type)) => {
            checker.evaluate_strikes(strikes, stock_price, option_type, dte, now)
        }
        _ => (strikes, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::OptionType;

    #[test]
    fn test_strength_buckets() {
        assert_eq!(strength_for(0.7, 0.7, 0.5), SignalStrength::Strong);
        assert_eq!(strength_for(0.69, 0.7, 0.5), SignalStrength::Moderate);
        assert_eq!(strength_for(0.49, 0.7, 0.5), SignalStrength::Weak);
        assert_eq!(strength_for(0.6, 0.8, 0.6), SignalStrength::Moderate);
    }

    #[test]
    fn test_call_strikes() {
        let strikes = calculate_strike_recommendations(300.0, SignalDirection::Call);
        assert_eq!(strikes.len(), 2);
        assert_eq!(strikes[0].strike, 315.0);
        assert_eq!(strikes[0].risk, Some(RiskLevel::Moderate));
        assert_eq!(strikes[1].strike, 330.0);
        assert_eq!(strikes[1].otm_pct, 10.0);
        assert!(strikes.iter().all(|s| s.option_type == OptionType::Call));
    }

    #[test]
    fn test_put_strikes_and_bankers_rounding() {
        let strikes = calculate_strike_recommendations(300.0, SignalDirection::Put);
        assert_eq!(strikes[0].strike, 285.0);
        assert_eq!(strikes[1].strike, 270.0);

        // 250 * 1.05 = 262.5 rounds to the even dollar
        let strikes = calculate_strike_recommendations(250.0, SignalDirection::Call);
        assert_eq!(strikes[0].strike, 262.0);
        assert_eq!(strikes[1].strike, 275.0);

        assert!(calculate_strike_recommendations(300.0, SignalDirection::Neutral).is_empty());
    }

    #[test]
    fn test_price_filter_keeps_unpriced() {
        let mut cheap = StrikeRecommendation::new(315.0, OptionType::Call, 5.0, RiskLevel::Moderate);
        cheap.last_price = Some(0.95);
        let mut pricey = StrikeRecommendation::new(305.0, OptionType::Call, 1.7, RiskLevel::Moderate);
        pricey.ask = Some(2.4);
        let unknown = StrikeRecommendation::new(330.0, OptionType::Call, 10.0, RiskLevel::High);

        let kept = filter_strikes_by_price(vec![cheap, pricey, unknown], 1.0);
        let strikes: Vec<f64> = kept.iter().map(|s| s.strike).collect();
        assert_eq!(strikes, vec![315.0, 330.0]);
    }
}
