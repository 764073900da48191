//! Core alert logic
//!
//! - Session calendar and job schedule
//! - One detector per catalyst type behind `SignalDetector`
//! - Alert system tying detectors, history and notifications together

pub mod types;
pub mod calendar;
pub mod signal;
pub mod ad_sector;
pub mod company_news;
pub mod friday_0dte;
pub mod live_news;
pub mod schedule;
pub mod alert_system;

// Re-export commonly used types
pub use alert_system::AlertSystem;
pub use calendar::MarketSession;
pub use schedule::{Job, Scheduler};
pub use signal::SignalDetector;
pub use types::{Signal, SignalDirection, SignalStrength};
