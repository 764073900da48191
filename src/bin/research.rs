//! Catalyst Research
//!
//! One-off study of the watched ticker: big move days, Friday behaviour,
//! intraday Friday ranges, the live chain and ad-sector correlation.
//!
//! Usage:
//!   cargo run --bin research
//!   cargo run --bin research -- --ticker APP --config config.toml

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use options_catalyst::analysis::ResearchReport;
use options_catalyst::config::Config;
use options_catalyst::data::news::FinnhubNews;
use options_catalyst::data::yahoo::YahooClient;

#[derive(Parser, Debug)]
#[command(name = "research", about = "Historical catalyst research for the watched ticker")]
struct Args {
    /// Path to the TOML config
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Ticker to study (default: watch.ticker from config)
    #[arg(long)]
    ticker: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // fetch failures only
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::WARN)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cfg = Config::load_or_default(&args.config)?;
    let ticker = args.ticker.unwrap_or_else(|| cfg.watch.ticker.clone());

    println!("================================================================");
    println!("              OPTIONS CATALYST RESEARCH                         ");
    println!("================================================================");
    println!();
    println!("Ticker:  {}", ticker);
    println!("Peers:   {}", cfg.watch.sector_tickers.join(", "));
    println!("Target:  {:.0}% option gain", cfg.strategy.target_gain * 100.0);
    println!();
    println!("Fetching history...");

    let market = YahooClient::new()?;
    let report = ResearchReport::build(
        &market,
        &ticker,
        &cfg.watch.sector_tickers,
        cfg.strategy.target_gain,
    )
    .await?;

    let finnhub = FinnhubNews::new(cfg.news.finnhub_api_key.clone());
    let report = if finnhub.is_enabled() {
        match finnhub.market_news("general").await {
            Ok(news) => report.with_news(news),
            Err(e) => {
                println!("Market news unavailable: {}", e);
                report
            }
        }
    } else {
        report
    };

    if report.daily.is_empty() {
        println!("No daily history returned for {}.", ticker);
        return Ok(());
    }

    println!();
    print!("{}", report);
    Ok(())
}
