//! Backtest Evaluation
//!
//! Replays a frozen policy (or any supplied action sequence) through a
//! single-position simulator and derives PnL, win rate, Sharpe ratio and
//! drawdown from the resulting equity curve.

pub mod evaluator;
pub mod metrics;
pub mod report;
pub mod simulator;

pub use evaluator::{evaluate_actions, Evaluator};
pub use report::{render_comparison, BacktestReport, ComparisonRow};
pub use simulator::{PositionSimulator, PositionState, SimulationResult, Trade};
