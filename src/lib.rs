//! Options Catalyst Library
//!
//! Catalyst detection and alerting for short-dated OTM options on a single
//! watched ticker.
//!
//! # Layout
//!
//! - `core`: detectors, session calendar, scheduler and the alert system
//! - `data`: market data, news feeds and the option price history store
//! - `comms`: Discord webhook notifications
//! - `analysis`: historical research report

pub mod core;
pub mod data;
pub mod comms;
pub mod config;
pub mod analysis;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;
