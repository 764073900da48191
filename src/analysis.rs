//! Catalyst research
//!
//! A one-off look back over a year of daily bars and a month of 5-minute
//! bars: how big the moves are, how Fridays behave, how the ticker tracks
//! its ad-tech peers, and what an OTM option needs to hit the target gain.
//!
//! Usage:
//! ```text
//! cargo run --bin research -- --ticker APP
//! ```

use anyhow::Result;
use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

use crate::data::market::{Bar, MarketData, OptionContract, OptionsChain};
use crate::data::news::NewsArticle;

/// Daily move that counts as a big move, in percent.
pub const BIG_MOVE_PCT: f64 = 5.0;
/// Premium used for the gain requirement example.
pub const EXAMPLE_PREMIUM: f64 = 0.50;
/// Fridays listed individually in the report.
pub const RECENT_FRIDAYS: usize = 8;
/// Headlines listed in the report.
pub const NEWS_LINES: usize = 8;

const SEP: &str = "============================================================";
const RULE: &str = "----------------------------------------";

#[derive(Debug, Clone, PartialEq)]
pub struct DailyStat {
    pub date: NaiveDate,
    pub weekday: Weekday,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Close-to-close, `None` for the first bar.
    pub return_pct: Option<f64>,
    /// High-low over the open.
    pub range_pct: f64,
}

pub fn daily_stats(bars: &[Bar]) -> Vec<DailyStat> {
    let mut prev_close: Option<f64> = None;

    bars.iter()
        .map(|b| {
            let return_pct = prev_close
                .filter(|p| *p > 0.0)
                .map(|p| (b.close - p) / p * 100.0);
            prev_close = Some(b.close);
            let date = b.time.date_naive();
            DailyStat {
                date,
                weekday: date.weekday(),
                open: b.open,
                high: b.high,
                low: b.low,
                close: b.close,
                return_pct,
                range_pct: if b.open > 0.0 { (b.high - b.low) / b.open * 100.0 } else { 0.0 },
            }
        })
        .collect()
}

/// Days whose absolute return exceeds `threshold`, largest gain first.
pub fn big_moves(stats: &[DailyStat], threshold: f64) -> Vec<DailyStat> {
    let mut moves: Vec<DailyStat> = stats
        .iter()
        .filter(|s| s.return_pct.map_or(false, |r| r.abs() > threshold))
        .cloned()
        .collect();
    moves.sort_by(|a, b| {
        let (ra, rb) = (a.return_pct.unwrap_or(0.0), b.return_pct.unwrap_or(0.0));
        rb.total_cmp(&ra)
    });
    moves
}

fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        None
    } else {
        Some(xs.iter().sum::<f64>() / xs.len() as f64)
    }
}

/// Sample standard deviation (n - 1).
fn sample_std(xs: &[f64]) -> Option<f64> {
    if xs.len() < 2 {
        return None;
    }
    let m = mean(xs)?;
    let var = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64;
    Some(var.sqrt())
}

#[derive(Debug, Clone, PartialEq)]
pub struct FridaySummary {
    pub count: usize,
    pub avg_return: Option<f64>,
    pub std_return: Option<f64>,
    pub avg_range: Option<f64>,
    pub max_range: Option<f64>,
    pub big_moves: usize,
    /// Share of all big-move days that fell on a Friday, in percent.
    pub big_move_share: Option<f64>,
}

pub fn friday_summary(stats: &[DailyStat], threshold: f64) -> FridaySummary {
    let fridays: Vec<&DailyStat> = stats.iter().filter(|s| s.weekday == Weekday::Fri).collect();
    let returns: Vec<f64> = fridays.iter().filter_map(|s| s.return_pct).collect();
    let ranges: Vec<f64> = fridays.iter().map(|s| s.range_pct).collect();

    let all_big = big_moves(stats, threshold);
    let friday_big = all_big.iter().filter(|s| s.weekday == Weekday::Fri).count();

    FridaySummary {
        count: fridays.len(),
        avg_return: mean(&returns),
        std_return: sample_std(&returns),
        avg_range: mean(&ranges),
        max_range: ranges.iter().copied().reduce(f64::max),
        big_moves: friday_big,
        big_move_share: if all_big.is_empty() {
            None
        } else {
            Some(friday_big as f64 / all_big.len() as f64 * 100.0)
        },
    }
}

/// The last `n` Fridays, oldest first.
pub fn recent_fridays(stats: &[DailyStat], n: usize) -> Vec<&DailyStat> {
    let fridays: Vec<&DailyStat> = stats.iter().filter(|s| s.weekday == Weekday::Fri).collect();
    let skip = fridays.len().saturating_sub(n);
    fridays.into_iter().skip(skip).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntradaySession {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub return_pct: f64,
    pub range_pct: f64,
    pub max_drawdown_pct: f64,
    pub max_rally_pct: f64,
}

/// Roll intraday bars up into one session per date on `weekday`.
pub fn intraday_sessions(bars: &[Bar], weekday: Weekday) -> Vec<IntradaySession> {
    let mut by_date: Vec<(NaiveDate, Vec<&Bar>)> = Vec::new();
    for bar in bars {
        let date = bar.time.date_naive();
        if date.weekday() != weekday {
            continue;
        }
        if let Some((d, day)) = by_date.last_mut() {
            if *d == date {
                day.push(bar);
                continue;
            }
        }
        by_date.push((date, vec![bar]));
    }
    by_date.sort_by_key(|(d, _)| *d);

    by_date
        .into_iter()
        .filter_map(|(date, day)| {
            let open = day.first()?.open;
            let close = day.last()?.close;
            if open <= 0.0 {
                return None;
            }
            let high = day.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let low = day.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            let pct = |v: f64| (v - open) / open * 100.0;
            Some(IntradaySession {
                date,
                open,
                high,
                low,
                close,
                return_pct: pct(close),
                range_pct: (high - low) / open * 100.0,
                max_drawdown_pct: pct(low),
                max_rally_pct: pct(high),
            })
        })
        .collect()
}

pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs)?;
    let my = mean(ys)?;

    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        cov += (x - mx) * (y - my);
        vx += (x - mx).powi(2);
        vy += (y - my).powi(2);
    }
    if vx == 0.0 || vy == 0.0 {
        return None;
    }
    Some(cov / (vx.sqrt() * vy.sqrt()))
}

/// Correlation of daily returns over the dates both series share.
pub fn return_correlation(a: &[DailyStat], b: &[DailyStat]) -> Option<f64> {
    let other: HashMap<NaiveDate, f64> = b
        .iter()
        .filter_map(|s| s.return_pct.map(|r| (s.date, r)))
        .collect();

    let (xs, ys): (Vec<f64>, Vec<f64>) = a
        .iter()
        .filter_map(|s| Some((s.return_pct?, *other.get(&s.date)?)))
        .unzip();
    pearson(&xs, &ys)
}

/// How far past the strike the stock must finish for a premium to hit the
/// target gain.
#[derive(Debug, Clone, PartialEq)]
pub struct GainRequirement {
    pub premium: f64,
    pub target_gain: f64,
    pub move_beyond_strike: f64,
    pub pct_of_spot: f64,
}

pub fn gain_requirement(premium: f64, target_gain: f64, spot: f64) -> GainRequirement {
    let move_beyond_strike = premium * (1.0 + target_gain);
    GainRequirement {
        premium,
        target_gain,
        move_beyond_strike,
        pct_of_spot: if spot > 0.0 { move_beyond_strike / spot * 100.0 } else { 0.0 },
    }
}

#[derive(Debug, Clone)]
pub struct ResearchReport {
    pub ticker: String,
    pub daily: Vec<DailyStat>,
    pub big_moves: Vec<DailyStat>,
    pub fridays: FridaySummary,
    pub intraday_bars: usize,
    pub friday_sessions: Vec<IntradaySession>,
    pub chain: Option<OptionsChain>,
    pub current_price: f64,
    pub correlations: Vec<(String, Option<f64>)>,
    pub gain: GainRequirement,
    pub news: Vec<NewsArticle>,
}

impl ResearchReport {
    /// Fetch history for the ticker and its peers and build the report.
    /// Peer and chain failures are logged and left out.
    pub async fn build(
        market: &dyn MarketData,
        ticker: &str,
        peers: &[String],
        target_gain: f64,
    ) -> Result<Self> {
        let daily = daily_stats(&market.get_history(ticker, "1y", "1d").await?);
        let intraday = market.get_history(ticker, "30d", "5m").await.unwrap_or_else(|e| {
            warn!("Intraday history unavailable: {}", e);
            Vec::new()
        });

        let chain = match market.get_options_chain(ticker, None).await {
            Ok(c) if !c.is_empty() => Some(c),
            Ok(_) => None,
            Err(e) => {
                warn!("Options chain unavailable: {}", e);
                None
            }
        };

        let current_price = match market.get_quote(ticker).await {
            Ok(q) => q.price,
            Err(_) => daily.last().map(|d| d.close).unwrap_or(0.0),
        };

        let mut correlations = Vec::new();
        for peer in peers.iter().filter(|p| p.as_str() != ticker) {
            let corr = match market.get_history(peer, "1y", "1d").await {
                Ok(bars) => return_correlation(&daily, &daily_stats(&bars)),
                Err(e) => {
                    warn!("{}: {}", peer, e);
                    None
                }
            };
            correlations.push((peer.clone(), corr));
        }

        Ok(Self {
            ticker: ticker.to_string(),
            big_moves: big_moves(&daily, BIG_MOVE_PCT),
            fridays: friday_summary(&daily, BIG_MOVE_PCT),
            friday_sessions: intraday_sessions(&intraday, Weekday::Fri),
            intraday_bars: intraday.len(),
            daily,
            chain,
            current_price,
            correlations,
            gain: gain_requirement(EXAMPLE_PREMIUM, target_gain, current_price),
            news: Vec::new(),
        })
    }

    pub fn with_news(mut self, news: Vec<NewsArticle>) -> Self {
        self.news = news;
        self
    }
}

fn opt(v: Option<f64>, decimals: usize) -> String {
    v.map(|x| format!("{:.*}", decimals, x)).unwrap_or_else(|| "n/a".to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max).collect::<String>())
    }
}

fn contract_line(c: &OptionContract, letter: char) -> String {
    format!(
        "  ${:.0}{}: Last ${:.2} | Bid ${:.2} | Ask ${:.2} | Vol: {} | OI: {} | IV: {:.1}%",
        c.strike,
        letter,
        c.last_price,
        c.bid,
        c.ask,
        c.volume,
        c.open_interest,
        c.implied_volatility * 100.0
    )
}

impl fmt::Display for ResearchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", SEP)?;
        writeln!(f, "{} OPTIONS CATALYST RESEARCH", self.ticker)?;
        writeln!(f, "{}", SEP)?;

        writeln!(f, "\n1. DAILY DATA (1 YEAR)\n{}", RULE)?;
        writeln!(f, "Data points: {} trading days", self.daily.len())?;
        if let (Some(first), Some(last)) = (self.daily.first(), self.daily.last()) {
            let low = self.daily.iter().map(|d| d.low).fold(f64::MAX, f64::min);
            let high = self.daily.iter().map(|d| d.high).fold(f64::MIN, f64::max);
            writeln!(f, "Date Range: {} to {}", first.date, last.date)?;
            writeln!(f, "Price Range: ${:.2} - ${:.2}", low, high)?;
            writeln!(f, "Last Close: ${:.2}", last.close)?;
        }

        writeln!(f, "\n2. BIG MOVE DAYS (>{:.0}% daily move)\n{}", BIG_MOVE_PCT, RULE)?;
        writeln!(f, "Total days with >{:.0}% moves: {}", BIG_MOVE_PCT, self.big_moves.len())?;
        for d in &self.big_moves {
            writeln!(
                f,
                "  {} ({:<3}): {:+6.1}% | Range: {:5.1}%",
                d.date,
                d.weekday,
                d.return_pct.unwrap_or(0.0),
                d.range_pct
            )?;
        }

        let fr = &self.fridays;
        writeln!(f, "\n3. FRIDAY ANALYSIS\n{}", RULE)?;
        writeln!(f, "Total Fridays in dataset: {}", fr.count)?;
        writeln!(f, "Average Friday Return: {}%", opt(fr.avg_return, 2))?;
        writeln!(f, "Std Dev of Returns: {}%", opt(fr.std_return, 2))?;
        writeln!(f, "Average Intraday Range: {}%", opt(fr.avg_range, 2))?;
        writeln!(f, "Max Intraday Range: {}%", opt(fr.max_range, 2))?;
        writeln!(f, "Fridays with >{:.0}% moves: {}", BIG_MOVE_PCT, fr.big_moves)?;
        writeln!(f, "% of big moves on Friday: {}%", opt(fr.big_move_share, 1))?;

        writeln!(f, "\nRecent Fridays (last {}):\n{}", RECENT_FRIDAYS, RULE)?;
        for d in recent_fridays(&self.daily, RECENT_FRIDAYS) {
            writeln!(
                f,
                "  {}: Open ${:.2} | Close ${:.2} | Return: {} | Range: {:.1}%",
                d.date,
                d.open,
                d.close,
                d.return_pct.map(|r| format!("{:+.1}%", r)).unwrap_or_else(|| "n/a".to_string()),
                d.range_pct
            )?;
        }

        writeln!(f, "\n4. INTRADAY FRIDAYS (5-min bars, last 30 days)\n{}", RULE)?;
        writeln!(f, "Intraday data points: {}", self.intraday_bars)?;
        for s in &self.friday_sessions {
            writeln!(
                f,
                "  {}: Open ${:.2} | High ${:.2} | Low ${:.2} | Return: {:+.1}% | Range: {:.1}% | MaxDown: {:+.1}% | MaxUp: {:+.1}%",
                s.date, s.open, s.high, s.low, s.return_pct, s.range_pct, s.max_drawdown_pct, s.max_rally_pct
            )?;
        }

        writeln!(f, "\n5. OPTIONS CHAIN\n{}", RULE)?;
        writeln!(f, "Current {} Price: ${:.2}", self.ticker, self.current_price)?;
        match &self.chain {
            Some(chain) => {
                writeln!(f, "Available expirations: {}", chain.expirations.len())?;
                for exp in chain.expirations.iter().take(5) {
                    writeln!(f, "  - {}", exp)?;
                }
                writeln!(f, "\nOTM Calls (Strike > ${:.2}):", self.current_price)?;
                for c in chain.otm_calls(self.current_price, 8) {
                    writeln!(f, "{}", contract_line(c, 'C'))?;
                }
                writeln!(f, "\nOTM Puts (Strike < ${:.2}):", self.current_price)?;
                for c in chain.otm_puts(self.current_price, 8) {
                    writeln!(f, "{}", contract_line(c, 'P'))?;
                }
            }
            None => writeln!(f, "No options chain available")?,
        }

        writeln!(f, "\n6. AD SECTOR CORRELATION\n{}", RULE)?;
        for (peer, corr) in &self.correlations {
            writeln!(f, "  {} vs {}: {} correlation", self.ticker, peer, opt(*corr, 3))?;
        }

        if !self.news.is_empty() {
            writeln!(f, "\n7. MARKET NEWS\n{}", RULE)?;
            for a in self.news.iter().take(NEWS_LINES) {
                writeln!(f, "  [{}] {}", a.published.format("%Y-%m-%d"), truncate(&a.title, 70))?;
            }
        }

        let g = &self.gain;
        writeln!(f, "\n{}\nSUMMARY\n{}", SEP, SEP)?;
        writeln!(f, "Option gain requirement ({:.0}%):", g.target_gain * 100.0)?;
        writeln!(
            f,
            "  - A ${:.2} OTM option needs the stock ~${:.2} beyond the strike",
            g.premium, g.move_beyond_strike
        )?;
        writeln!(f, "  - About {:.1}% of spot beyond the strike", g.pct_of_spot)?;
        writeln!(f, "{}", SEP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{contract, FakeMarket};
    use chrono::{DateTime, Local, TimeZone};

    fn bar(time: DateTime<Local>, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar { time, open, high, low, close, volume: 1000 }
    }

    fn day(d: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 1, d, 16, 0, 0).unwrap()
    }

    // Mon 6 .. Fri 10, Mon 13 .. Fri 17
    fn daily_bars() -> Vec<Bar> {
        vec![
            bar(day(6), 100.0, 102.0, 98.0, 100.0),
            bar(day(7), 100.0, 103.0, 99.0, 102.0),
            bar(day(8), 102.0, 103.0, 101.0, 101.0),
            bar(day(9), 101.0, 104.0, 100.0, 103.0),
            bar(day(10), 103.0, 112.0, 102.0, 110.0),
            bar(day(13), 110.0, 111.0, 99.0, 100.0),
            bar(day(17), 100.0, 101.0, 95.0, 99.0),
        ]
    }

    #[test]
    fn test_daily_stats() {
        let stats = daily_stats(&daily_bars());
        assert_eq!(stats[0].return_pct, None);
        assert!((stats[1].return_pct.unwrap() - 2.0).abs() < 1e-9);
        assert!((stats[0].range_pct - 4.0).abs() < 1e-9);
        assert_eq!(stats[4].weekday, Weekday::Fri);
    }

    #[test]
    fn test_big_moves_sorted() {
        let stats = daily_stats(&daily_bars());
        let moves = big_moves(&stats, BIG_MOVE_PCT);
        let dates: Vec<u32> = moves.iter().map(|d| d.date.day()).collect();
        // +6.8% on the 10th, -9.1% on the 13th
        assert_eq!(dates, vec![10, 13]);
    }

    #[test]
    fn test_friday_summary() {
        let stats = daily_stats(&daily_bars());
        let fr = friday_summary(&stats, BIG_MOVE_PCT);
        assert_eq!(fr.count, 2);
        assert_eq!(fr.big_moves, 1);
        assert_eq!(fr.big_move_share, Some(50.0));
        // returns: (110-103)/103, (99-100)/100
        let r1 = 7.0 / 103.0 * 100.0;
        let r2 = -1.0;
        assert!((fr.avg_return.unwrap() - (r1 + r2) / 2.0).abs() < 1e-9);
        let expected_std = ((r1 - r2).powi(2) / 2.0).sqrt();
        assert!((fr.std_return.unwrap() - expected_std).abs() < 1e-9);
        assert!((fr.max_range.unwrap() - 10.0 / 103.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_recent_fridays() {
        let stats = daily_stats(&daily_bars());
        let all: Vec<u32> = recent_fridays(&stats, 8).iter().map(|d| d.date.day()).collect();
        assert_eq!(all, vec![10, 17]);
        let last: Vec<u32> = recent_fridays(&stats, 1).iter().map(|d| d.date.day()).collect();
        assert_eq!(last, vec![17]);
    }

    #[test]
    fn test_intraday_sessions() {
        let t = |d: u32, h: u32, m: u32| Local.with_ymd_and_hms(2025, 1, d, h, m, 0).unwrap();
        let bars = vec![
            bar(t(9, 9, 30), 50.0, 51.0, 49.0, 50.5),
            bar(t(10, 9, 30), 100.0, 101.0, 97.0, 98.0),
            bar(t(10, 9, 35), 98.0, 104.0, 98.0, 103.0),
            bar(t(10, 15, 55), 103.0, 103.5, 101.0, 102.0),
        ];
        let sessions = intraday_sessions(&bars, Weekday::Fri);
        assert_eq!(sessions.len(), 1);
        let s = &sessions[0];
        assert_eq!(s.open, 100.0);
        assert_eq!(s.close, 102.0);
        assert_eq!(s.high, 104.0);
        assert_eq!(s.low, 97.0);
        assert!((s.range_pct - 7.0).abs() < 1e-9);
        assert!((s.max_drawdown_pct + 3.0).abs() < 1e-9);
        assert!((s.max_rally_pct - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_pearson() {
        assert!((pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&[1.0, 1.0], &[2.0, 3.0]), None);
        assert_eq!(pearson(&[1.0], &[2.0]), None);
    }

    #[test]
    fn test_correlation_inner_join() {
        let a = daily_stats(&daily_bars());
        // peer missing the 8th and with an extra day
        let mut peer_bars: Vec<Bar> = daily_bars()
            .into_iter()
            .filter(|b| b.time.day() != 8)
            .map(|mut b| {
                b.close *= 2.0;
                b
            })
            .collect();
        peer_bars.push(bar(day(20), 1.0, 1.0, 1.0, 1.0));
        let b = daily_stats(&peer_bars);
        let corr = return_correlation(&a, &b).unwrap();
        assert!(corr > 0.5);
    }

    #[test]
    fn test_gain_requirement() {
        let g = gain_requirement(0.50, 7.5, 425.0);
        assert!((g.move_beyond_strike - 4.25).abs() < 1e-9);
        assert!((g.pct_of_spot - 1.0).abs() < 1e-9);
        assert_eq!(gain_requirement(0.5, 7.5, 0.0).pct_of_spot, 0.0);
    }

    #[tokio::test]
    async fn test_build_report() {
        let market = FakeMarket::new(99.0, -1.0);
        market.set_history("APP", daily_bars());
        market.set_history("META", daily_bars());
        market.set_chain(
            vec![contract(100.0, 1.2, 10, 100), contract(105.0, 0.4, 5, 50)],
            vec![contract(95.0, 0.6, 8, 70)],
        );

        let peers = vec!["META".to_string(), "APP".to_string()];
        let report = ResearchReport::build(&market, "APP", &peers, 7.5).await.unwrap();
        assert_eq!(report.correlations.len(), 1);
        assert!((report.correlations[0].1.unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(report.big_moves.len(), 2);

        let text = report.to_string();
        assert!(text.contains("APP OPTIONS CATALYST RESEARCH"));
        assert!(text.contains("$100C: Last $1.20"));
        assert!(text.contains("APP vs META: 1.000 correlation"));
        assert!(text.contains("Recent Fridays (last 8):"));
        assert!(text.contains("2025-01-17: Open $100.00 | Close $99.00 | Return: -1.0% | Range: 6.0%"));
        assert!(!text.contains("MARKET NEWS"));

        let headline = NewsArticle::new("Stocks rally into the close", "CNBC", "https://m", day(17), "", vec![]);
        let text = report.with_news(vec![headline]).to_string();
        assert!(text.contains("7. MARKET NEWS"));
        assert!(text.contains("[2025-01-17] Stocks rally into the close"));
    }
}
