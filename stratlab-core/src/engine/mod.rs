//! Simulation engine: rebalance/contribution scheduling, execution with
//! costs and liquidity constraints, and the daily event loop.

pub mod execution;
pub mod schedule;
pub mod simulation;

pub use execution::{plan_rebalance, ExecutionParams, PlannedTrades};
pub use schedule::{contribution_due, rebalance_due, ContributionFrequency, RebalanceFrequency};
pub use simulation::{
    ContributionPlan, DailyRecord, EngineError, EngineSettings, Simulation, SimulationResult,
    StrategyDef,
};
