//! Status file for sharing state between processes

use anyhow::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::core::alert_system::AlertSystem;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SystemStatus {
    pub running: bool,
    pub start_time: i64,
    pub ticker: String,
    pub signals_today: u32,
    pub last_signal: String,
    pub last_check: Option<DateTime<Local>>,
    pub last_live_news_check: Option<DateTime<Local>>,
    /// Rows in the option history database for the ticker.
    pub snapshots_stored: u64,
    /// Snapshots collected since this process started.
    pub snapshots_this_run: u64,
    pub last_price: f64,
}

impl SystemStatus {
    /// Snapshot of the alert system's counters.
    pub fn capture(system: &AlertSystem, start_time: i64) -> Self {
        Self {
            running: true,
            start_time,
            ticker: system.ticker().to_string(),
            signals_today: system.signals_today().len() as u32,
            last_signal: system
                .signals_today()
                .last()
                .map(|s| s.to_string())
                .unwrap_or_default(),
            last_check: system.last_check(),
            last_live_news_check: system.last_live_news_check(),
            snapshots_stored: system
                .history()
                .snapshot_count(system.ticker())
                .unwrap_or_else(|e| {
                    warn!("Could not count stored snapshots: {}", e);
                    0
                }),
            snapshots_this_run: system.snapshots_collected(),
            last_price: system.last_price().unwrap_or(0.0),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if path.exists() {
            if let Ok(contents) = fs::read_to_string(path) {
                if let Ok(status) = serde_json::from_str(&contents) {
                    return status;
                }
            }
        }
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::at;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("options_catalyst_{}_{}.json", name, std::process::id()))
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path("status");
        let status = SystemStatus {
            running: true,
            start_time: 1_736_500_000,
            ticker: "APP".to_string(),
            signals_today: 2,
            last_signal: "Live Intraday News CALL".to_string(),
            last_check: Some(at(10, 11, 0)),
            last_live_news_check: Some(at(10, 11, 2)),
            snapshots_stored: 40,
            snapshots_this_run: 12,
            last_price: 312.5,
        };
        status.save(&path).unwrap();

        let loaded = SystemStatus::load(&path);
        assert!(loaded.running);
        assert_eq!(loaded.ticker, "APP");
        assert_eq!(loaded.signals_today, 2);
        assert_eq!(loaded.last_check, Some(at(10, 11, 0)));
        assert_eq!(loaded.snapshots_stored, 40);
        let _ = fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_capture_counts_database_rows() {
        use crate::core::calendar::MarketSession;
        use crate::data::options_history::{OptionSnapshot, OptionsHistoryDb};
        use crate::testing::{contract, FakeMarket, RecordingNotifier};
        use std::sync::Arc;

        let db = Arc::new(OptionsHistoryDb::open_in_memory().unwrap());
        // rows left over from an earlier run
        let expiry = at(10, 0, 0).date_naive();
        for strike in [305.0, 310.0, 315.0] {
            let old = OptionSnapshot::from_contract(
                at(3, 10, 0),
                "APP",
                300.0,
                expiry,
                0,
                crate::core::types::OptionType::Call,
                &contract(strike, 0.4, 10, 10),
            );
            db.store_snapshot(&old).unwrap();
        }

        let market = Arc::new(FakeMarket::new(300.0, 0.0));
        market.set_chain(vec![contract(305.0, 0.5, 10, 10)], vec![]);
        let mut system = AlertSystem::new(
            "APP",
            MarketSession::default(),
            Arc::new(RecordingNotifier::default()),
            market,
            db,
            6,
        );
        system.collect_options_data(at(9, 10, 0)).await;

        let status = SystemStatus::capture(&system, 0);
        assert_eq!(status.snapshots_this_run, 2);
        assert_eq!(status.snapshots_stored, 5);
        assert_eq!(status.ticker, "APP");
    }

    #[test]
    fn test_missing_or_corrupt_file_defaults() {
        let path = temp_path("corrupt");
        assert!(!SystemStatus::load(&path).running);
        fs::write(&path, "{not json").unwrap();
        assert_eq!(SystemStatus::load(&path).signals_today, 0);
        let _ = fs::remove_file(&path);
    }
}
