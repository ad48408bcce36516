//! Firstboard Core: decision engine for a first-board limit-up strategy.
//!
//! This crate contains:
//! - Domain types (daily bars, session bars, position records, sell signals)
//! - Collaborator traits for market data, calendar, candidates and the broker
//! - The candidate screener, entry allocator and exit rules
//! - The volume-weighted resistance estimator
//! - A tick-driven session scheduler and a replay driver over recorded data

pub mod broker;
pub mod components;
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod indicators;

pub use config::{ConfigError, StrategyConfig};
pub use engine::{StrategyScheduler, StrategyState};
