//! Communications Module
//!
//! - Discord webhook alerts and daily summaries

pub mod discord;
