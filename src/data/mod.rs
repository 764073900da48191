//! Data Module
//!
//! - Yahoo Finance quotes, option chains and bars
//! - Finnhub and NewsAPI headlines
//! - SQLite option price history

pub mod market;
pub mod yahoo;
pub mod news;
pub mod options_history;
