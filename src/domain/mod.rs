//! Core domain types and logic.

pub mod backtest;
pub mod bar;
pub mod config_validation;
pub mod date_range;
pub mod error;
pub mod indicator;
pub mod indicator_cache;
pub mod interpreter;
pub mod metrics;
pub mod node;
pub mod ohlc_cache;
pub mod parser;
pub mod precalc;
pub mod precalc_cache;
pub mod rebalancer;
