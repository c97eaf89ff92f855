//! StratLab core engine.
//!
//! Provides domain types, market data streaming, portfolio accounting,
//! execution simulation, strategy plugins, and the daily event loop.

pub mod data;
pub mod domain;
pub mod engine;
pub mod rng;
pub mod strategy;
