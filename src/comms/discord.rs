//! Discord webhook notifications
//!
//! Signals are rendered as a single rich embed. Rendering is pure so the
//! message layout can be checked without posting anything.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::core::types::{Catalyst, Signal, SignalDirection, SignalStrength, StrikeRecommendation};

const COLOR_CALL: u32 = 0x03fc07;
const COLOR_PUT: u32 = 0xfc0303;
const COLOR_NEUTRAL: u32 = 0x808080;
const COLOR_SUMMARY: u32 = 0x1e90ff;

const RISK_WARNING: &str =
    "0-2 DTE options are extremely risky. Only trade with money you can afford to lose.";
const HEADLINE_CHARS: usize = 100;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_signal(&self, signal: &Signal) -> Result<()>;

    async fn send_test_message(&self) -> Result<()>;

    async fn send_daily_summary(&self, signals: &[Signal], price_change: f64, now: DateTime<Local>) -> Result<()>;
}

pub struct DiscordNotifier {
    webhook_url: Option<String>,
    ticker: String,
    client: reqwest::Client,
}

impl DiscordNotifier {
    pub fn new(webhook_url: Option<String>, ticker: &str) -> Self {
        let webhook_url = webhook_url.filter(|u| !u.is_empty());
        if webhook_url.is_none() {
            warn!("Discord webhook URL not configured. Notifications disabled.");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            webhook_url,
            ticker: ticker.to_string(),
            client,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }

    async fn post(&self, payload: &Value) -> Result<()> {
        let url = self
            .webhook_url
            .as_deref()
            .ok_or_else(|| anyhow!("webhook URL not configured"))?;

        let resp = self.client.post(url).json(payload).send().await?;
        let status = resp.status().as_u16();
        if status == 200 || status == 204 {
            Ok(())
        } else {
            bail!("Discord webhook returned {}", status)
        }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send_signal(&self, signal: &Signal) -> Result<()> {
        let payload = json!({ "embeds": [signal_embed(&self.ticker, signal)] });
        match self.post(&payload).await {
            Ok(()) => {
                info!("Discord notification sent successfully for {}", signal.name);
                Ok(())
            }
            Err(e) => {
                error!("Failed to send Discord notification: {}", e);
                Err(e)
            }
        }
    }

    async fn send_test_message(&self) -> Result<()> {
        let payload = json!({
            "content": format!(
                "🧪 **{} Options Alert System Test**\n\nWebhook is configured correctly!",
                self.ticker
            )
        });
        self.post(&payload).await?;
        info!("Test message sent successfully");
        Ok(())
    }

    async fn send_daily_summary(&self, signals: &[Signal], price_change: f64, now: DateTime<Local>) -> Result<()> {
        let payload = json!({
            "embeds": [daily_summary_embed(&self.ticker, signals, price_change, now)]
        });
        self.post(&payload).await
    }
}

fn field(name: &str, value: String, inline: bool) -> Value {
    json!({ "name": name, "value": value, "inline": inline })
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn pct(v: f64) -> String {
    format!("{:.0}%", v * 100.0)
}

pub fn signal_embed(ticker: &str, signal: &Signal) -> Value {
    let (color, emoji, direction_text) = match signal.direction {
        SignalDirection::Call => (COLOR_CALL, "📈", "LONG CALL"),
        SignalDirection::Put => (COLOR_PUT, "📉", "LONG PUT"),
        SignalDirection::Neutral => (COLOR_NEUTRAL, "⚪", "NEUTRAL"),
    };

    let strength_emoji = match signal.strength {
        SignalStrength::Strong => "🔥",
        SignalStrength::Moderate => "⚡",
        SignalStrength::Weak => "💡",
    };

    let mut fields = vec![
        field("📊 Stock Data", format!("**Price:** ${:.2}", signal.current_price), true),
        field(
            "💪 Strength",
            format!("{} {}", strength_emoji, signal.strength.as_str()),
            true,
        ),
        field("📊 Confidence Breakdown", format_confidence_breakdown(signal), false),
        field("⚡ Catalyst", format_catalyst(&signal.catalyst), false),
    ];

    if !signal.recommended_strikes.is_empty() {
        fields.push(field(
            "🎯 Recommended Strikes",
            format_strikes(&signal.recommended_strikes),
            false,
        ));
    }
    fields.push(field("⚠️ Risk Warning", RISK_WARNING.to_string(), false));

    json!({
        "title": format!("{} {} OPTIONS ALERT {}", emoji, ticker, emoji),
        "description": format!("**Signal:** {}\n**Direction:** {}", signal.name, direction_text),
        "color": color,
        "timestamp": signal.timestamp.to_rfc3339(),
        "fields": fields,
        "footer": { "text": format!("{} Options Trading Model | Not Financial Advice", ticker) },
    })
}

/// One line per component, a rule, then the total ("capped" when the
/// components add up past 100%).
pub fn format_confidence_breakdown(signal: &Signal) -> String {
    let breakdown = &signal.breakdown;
    if breakdown.is_empty() {
        return format!("**Total:** {}", pct(signal.confidence));
    }

    let mut lines: Vec<String> = breakdown
        .components
        .iter()
        .map(|c| match c.description.as_deref() {
            Some(desc) if !desc.is_empty() => format!("+ **{}** {}\n  _{}_", pct(c.value), c.name, desc),
            _ => format!("+ **{}** {}", pct(c.value), c.name),
        })
        .collect();

    lines.push("─".repeat(18));
    if breakdown.is_capped() {
        lines.push(format!("= **{}** Total _(capped)_", pct(signal.confidence)));
    } else {
        lines.push(format!("= **{}** Total", pct(signal.confidence)));
    }
    lines.join("\n")
}

pub fn format_catalyst(catalyst: &Catalyst) -> String {
    match catalyst {
        Catalyst::AdSectorNews { headline, source, sentiment, .. } => format!(
            "**Type:** Ad Sector News\n**Headline:** {}...\n**Source:** {}\n**Sentiment:** {}",
            truncate(headline, HEADLINE_CHARS),
            source,
            sentiment.as_str().to_uppercase()
        ),
        Catalyst::CompanyNews { headline, source, .. } => format!(
            "**Type:** Company News\n**Headline:** {}...\n**Source:** {}",
            truncate(headline, HEADLINE_CHARS),
            source
        ),
        Catalyst::Friday0Dte { premarket_move, setup_factors, .. } => {
            let factors: Vec<String> = setup_factors.iter().take(3).map(|f| format!("• {}", f)).collect();
            format!(
                "**Type:** Friday 0DTE Setup\n**Pre-market:** {:+.1}%\n**Factors:**\n{}",
                premarket_move,
                factors.join("\n")
            )
        }
        Catalyst::LiveNews { headline, source, minutes_ago, matched_keywords, .. } => format!(
            "**Type:** Live News ({}m ago)\n**Headline:** {}...\n**Source:** {}\n**Keywords:** {}",
            minutes_ago,
            truncate(headline, HEADLINE_CHARS),
            source,
            matched_keywords.join(", ")
        ),
    }
}

pub fn format_strikes(strikes: &[StrikeRecommendation]) -> String {
    if strikes.is_empty() {
        return "No specific strikes recommended".to_string();
    }

    strikes
        .iter()
        .take(3)
        .map(|s| {
            let label = format!("**${:.0}{}** ({:.1}% OTM)", s.strike, s.option_type.letter(), s.otm_pct);
            let last = s.last_price.unwrap_or(0.0);
            let bid = s.bid.unwrap_or(0.0);
            let ask = s.ask.unwrap_or(0.0);

            let mut line = if last > 0.0 {
                format!("• {} @ ${:.2}", label, last)
            } else if bid > 0.0 || ask > 0.0 {
                format!("• {} Bid/Ask: ${:.2}/${:.2}", label, bid, ask)
            } else {
                format!("• {}", label)
            };

            if let Some(cmp) = &s.price_comparison {
                if cmp.is_elevated {
                    let elevation = cmp.elevation_pct.unwrap_or(0.0) * 100.0;
                    line.push_str(&format!(" **[+{:.0}% vs avg]**", elevation));
                } else if !cmp.has_historical_data {
                    line.push_str(" *(no history)*");
                }
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn daily_summary_embed(ticker: &str, signals: &[Signal], price_change: f64, now: DateTime<Local>) -> Value {
    let arrow = if price_change > 0.0 {
        "📈"
    } else if price_change < 0.0 {
        "📉"
    } else {
        "➡️"
    };

    let mut fields = vec![
        field(&format!("📊 {} Performance", ticker), format!("{} {:+.2}%", arrow, price_change), true),
        field("🔔 Signals Today", signals.len().to_string(), true),
    ];

    if !signals.is_empty() {
        let lines: Vec<String> = signals
            .iter()
            .take(5)
            .map(|s| format!("• {} ({}) @ {}", s.name, s.direction, s.timestamp.format("%H:%M")))
            .collect();
        fields.push(field("📝 Signal Details", lines.join("\n"), false));
    }

    json!({
        "title": format!("📋 Daily Summary - {} Options", ticker),
        "description": format!("**Date:** {}", now.format("%Y-%m-%d")),
        "color": COLOR_SUMMARY,
        "timestamp": now.to_rfc3339(),
        "fields": fields,
        "footer": { "text": format!("{} Options Trading Model", ticker) },
    })
}
