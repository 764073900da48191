//! Core type definitions for the alert system
//!
//! A `Signal` is what every detector produces and what the notifier
//! renders. These types carry no behaviour beyond small derived queries.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum confidence for a signal to be sent.
pub const ACTIONABLE_CONFIDENCE: f64 = 0.5;

/// Direction of the trading signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalDirection {
    Call,
    Put,
    Neutral,
}

impl SignalDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalDirection::Call => "CALL",
            SignalDirection::Put => "PUT",
            SignalDirection::Neutral => "NEUTRAL",
        }
    }

    /// Option side that expresses this direction, if any.
    pub fn option_type(&self) -> Option<OptionType> {
        match self {
            SignalDirection::Call => Some(OptionType::Call),
            SignalDirection::Put => Some(OptionType::Put),
            SignalDirection::Neutral => None,
        }
    }
}

impl fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Strength/confidence bucket of the signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalStrength {
    Weak = 1,
    Moderate = 2,
    Strong = 3,
}

impl SignalStrength {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStrength::Weak => "WEAK",
            SignalStrength::Moderate => "MODERATE",
            SignalStrength::Strong => "STRONG",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionType::Call => "CALL",
            OptionType::Put => "PUT",
        }
    }

    /// Single-letter suffix used in strike labels ("$150C").
    pub fn letter(&self) -> char {
        match self {
            OptionType::Call => 'C',
            OptionType::Put => 'P',
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CALL" => Some(OptionType::Call),
            "PUT" => Some(OptionType::Put),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Moderate,
    High,
}

/// Keyword sentiment of a news article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Bullish => "bullish",
            Sentiment::Bearish => "bearish",
            Sentiment::Neutral => "neutral",
        }
    }

    pub fn direction(&self) -> SignalDirection {
        match self {
            Sentiment::Bullish => SignalDirection::Call,
            Sentiment::Bearish => SignalDirection::Put,
            Sentiment::Neutral => SignalDirection::Neutral,
        }
    }
}

/// Result of comparing an option's current price with its history bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceComparison {
    pub is_elevated: bool,
    pub current_price: f64,
    pub avg_price: Option<f64>,
    pub elevation_pct: Option<f64>,
    pub confidence_boost: f64,
    pub has_historical_data: bool,
}

impl PriceComparison {
    pub fn no_history(current_price: f64) -> Self {
        Self {
            is_elevated: false,
            current_price,
            avg_price: None,
            elevation_pct: None,
            confidence_boost: 0.0,
            has_historical_data: false,
        }
    }
}

/// A suggested contract to trade on a signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeRecommendation {
    pub strike: f64,
    pub option_type: OptionType,
    pub otm_pct: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bid: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ask: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_interest: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implied_volatility: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_comparison: Option<PriceComparison>,
}

impl StrikeRecommendation {
    /// A bare strike with no market data attached.
    pub fn new(strike: f64, option_type: OptionType, otm_pct: f64, risk: RiskLevel) -> Self {
        Self {
            strike,
            option_type,
            otm_pct,
            risk: Some(risk),
            last_price: None,
            bid: None,
            ask: None,
            volume: None,
            open_interest: None,
            implied_volatility: None,
            price_comparison: None,
        }
    }

    /// Best known option price: last trade, else ask.
    pub fn option_price(&self) -> Option<f64> {
        self.last_price
            .filter(|p| *p > 0.0)
            .or(self.ask.filter(|p| *p > 0.0))
    }
}

/// One additive term of a signal's confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceComponent {
    pub name: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub components: Vec<ConfidenceComponent>,
}

impl ConfidenceBreakdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, value: f64, description: Option<String>) {
        self.components.push(ConfidenceComponent {
            name: name.into(),
            value,
            description,
        });
    }

    pub fn raw_total(&self) -> f64 {
        self.components.iter().map(|c| c.value).sum()
    }

    /// True when the components add up past 100%.
    pub fn is_capped(&self) -> bool {
        self.raw_total() > 1.0 + 1e-9
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// What triggered a signal, with the per-detector details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "catalyst_type", rename_all = "snake_case")]
pub enum Catalyst {
    AdSectorNews {
        headline: String,
        source: String,
        sentiment: Sentiment,
        relevance_score: f64,
        news_url: String,
    },
    CompanyNews {
        headline: String,
        source: String,
        published: DateTime<Local>,
        impact_score: f64,
        news_url: String,
    },
    #[serde(rename = "friday_0dte")]
    Friday0Dte {
        premarket_move: f64,
        expiration: Option<String>,
        setup_factors: Vec<String>,
    },
    LiveNews {
        headline: String,
        source: String,
        published: DateTime<Local>,
        news_url: String,
        matched_keywords: Vec<String>,
        minutes_ago: i64,
    },
}

impl Catalyst {
    pub fn kind(&self) -> &'static str {
        match self {
            Catalyst::AdSectorNews { .. } => "ad_sector_news",
            Catalyst::CompanyNews { .. } => "company_news",
            Catalyst::Friday0Dte { .. } => "friday_0dte",
            Catalyst::LiveNews { .. } => "live_news",
        }
    }

    pub fn headline(&self) -> Option<&str> {
        match self {
            Catalyst::AdSectorNews { headline, .. }
            | Catalyst::CompanyNews { headline, .. }
            | Catalyst::LiveNews { headline, .. } => Some(headline),
            Catalyst::Friday0Dte { .. } => None,
        }
    }
}

/// A detected trading signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub name: String,
    pub direction: SignalDirection,
    pub strength: SignalStrength,
    /// 0.0 to 1.0
    pub confidence: f64,
    pub timestamp: DateTime<Local>,
    pub current_price: f64,
    pub catalyst: Catalyst,
    pub breakdown: ConfidenceBreakdown,
    pub recommended_strikes: Vec<StrikeRecommendation>,
    pub price_comparison_boost: f64,
}

impl Signal {
    pub fn is_actionable(&self) -> bool {
        self.confidence >= ACTIONABLE_CONFIDENCE && self.direction != SignalDirection::Neutral
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let Some(obj) = value.as_object_mut() {
            obj.insert("is_actionable".to_string(), self.is_actionable().into());
        }
        value
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Signal({}, {}, confidence={:.2})",
            self.name, self.direction, self.confidence
        )
    }
}
