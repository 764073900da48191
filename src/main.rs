//! Options catalyst alerts
//!
//! Watches one ticker on its weekly-expiry days for catalysts worth a cheap
//! 0DTE/1DTE OTM option:
//! - Ad-sector news moving the whole group
//! - Company-specific headlines
//! - Friday 0DTE momentum setups
//! - Breaking news in the last fifteen minutes
//!
//! Alerts go to a Discord webhook. Nothing is traded.

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

use options_catalyst::comms::discord::DiscordNotifier;
use options_catalyst::config::Config;
use options_catalyst::core::alert_system::AlertSystem;
use options_catalyst::core::schedule::Scheduler;
use options_catalyst::data::news::{FinnhubNews, NewsApi};
use options_catalyst::data::options_history::OptionsHistoryDb;
use options_catalyst::data::yahoo::YahooClient;
use options_catalyst::status::SystemStatus;

const SEP: &str = "===========================================================";

#[derive(Parser, Debug)]
#[command(name = "options-catalyst", about = "Catalyst alerts for short-dated OTM options")]
struct Args {
    /// Path to the TOML config
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Run one ungated check of every detector and exit
    #[arg(long)]
    test: bool,

    /// Send a test message to the Discord webhook and exit
    #[arg(long)]
    test_webhook: bool,

    /// Print the last saved status and exit
    #[arg(long)]
    status: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let cfg = Config::load_or_default(&args.config).unwrap_or_else(|e| {
        eprintln!("Failed to load {}: {}. Exiting.", args.config, e);
        std::process::exit(1);
    });

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cfg.log_level())
        .with_target(false)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.status {
        let status = SystemStatus::load(&cfg.storage.status_path);
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let ticker = cfg.watch.ticker.clone();
    let notifier = Arc::new(DiscordNotifier::new(cfg.webhook_url().map(str::to_string), &ticker));

    if args.test_webhook {
        use options_catalyst::comms::discord::Notifier;
        notifier.send_test_message().await?;
        info!("Discord webhook test successful!");
        return Ok(());
    }

    info!("{}", SEP);
    info!("  {} - {} Options Catalyst Alerts", cfg.system.name, ticker);
    info!("  Active days: {}", cfg.session.active_days.join(", "));
    info!("  Max option price: ${:.2} | Target gain: {:.0}%",
        cfg.strategy.max_option_price, cfg.strategy.target_gain * 100.0);
    info!("{}", SEP);

    if !notifier.is_configured() {
        warn!("DISCORD_WEBHOOK_URL not set - alerts will only be logged");
    }

    let market = Arc::new(YahooClient::new()?);
    let finnhub = Arc::new(FinnhubNews::new(cfg.news.finnhub_api_key.clone()));
    let newsapi = Arc::new(NewsApi::new(cfg.news.newsapi_key.clone()));

    let history = Arc::new(OptionsHistoryDb::open(&cfg.storage.db_path)?);
    match history.snapshot_count(&ticker) {
        Ok(n) if n > 0 => info!("Options history: {} snapshots on file", n),
        Ok(_) => info!("Options history: empty, collecting from scratch"),
        Err(e) => warn!("Could not read options history: {}", e),
    }

    let mut system = AlertSystem::from_config(&cfg, market, finnhub, newsapi, notifier, history)?;
    for (name, description) in system.detector_descriptions() {
        info!("Detector: {} - {}", name, description);
    }

    if args.test {
        info!("{}", SEP);
        info!("TEST MODE - single pass, session gates ignored");
        info!("{}", SEP);
        let signals = system.test_pass(Local::now()).await;
        info!("Test complete: {} signal(s)", signals.len());
        return Ok(());
    }

    let start = Local::now();
    let start_time = start.timestamp();
    let mut scheduler = Scheduler::from_config(&cfg.session, start)?;
    info!("Scheduler: {} jobs | standard every {}m | live news every {}m",
        scheduler.len(), cfg.session.check_interval_mins, cfg.session.live_news_interval_mins);

    system.run_check(start).await;
    system.run_live_news_check(start).await;
    save_status(&system, start_time, &cfg.storage.status_path);

    info!("Waiting for next check...");
    let mut tick = tokio::time::interval(tokio::time::Duration::from_secs(cfg.session.poll_secs.max(1)));

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let now = Local::now();
                let due = scheduler.due(now);
                if due.is_empty() {
                    continue;
                }
                for job in due {
                    info!("Running {}", job);
                    system.run_job(job, now).await;
                }
                save_status(&system, start_time, &cfg.storage.status_path);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
        }
    }

    let mut status = SystemStatus::capture(&system, start_time);
    status.running = false;
    if let Err(e) = status.save(&cfg.storage.status_path) {
        warn!("Failed to save status: {}", e);
    }
    info!("Stopped");
    Ok(())
}

fn save_status(system: &AlertSystem, start_time: i64, path: &str) {
    if let Err(e) = SystemStatus::capture(system, start_time).save(path) {
        warn!("Failed to save status: {}", e);
    }
}
