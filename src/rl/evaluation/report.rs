//! Backtest report and comparison table.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tabled::{Table, Tabled};

use super::metrics;
use super::simulator::SimulationResult;
use crate::error::{QTraderError, Result};
use crate::rl::core::{action_distribution, Action, NUM_ACTIONS};

/// Metrics for one replayed action sequence.
///
/// Serialized keys follow the report consumers: `"PnL"`, `"Sharpe Ratio"`,
/// `"Win Rate"`, plus `equity_curve` and `actions` (encoded BUY=0, SELL=1,
/// HOLD=2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    #[serde(rename = "PnL")]
    pub pnl: f64,
    #[serde(rename = "Sharpe Ratio")]
    pub sharpe_ratio: f64,
    #[serde(rename = "Win Rate")]
    pub win_rate: f64,
    #[serde(rename = "Max Drawdown")]
    pub max_drawdown: f64,
    #[serde(rename = "Max Drawdown Ratio")]
    pub max_drawdown_ratio: f64,
    #[serde(rename = "Trades")]
    pub trades: usize,
    pub equity_curve: Vec<f64>,
    pub actions: Vec<u8>,
}

impl BacktestReport {
    pub fn from_simulation(result: &SimulationResult, actions: &[Action]) -> Self {
        let equity = &result.equity_curve;
        Self {
            pnl: metrics::total_pnl(&result.trades),
            sharpe_ratio: metrics::sharpe_ratio(equity),
            win_rate: metrics::win_rate(&result.trades),
            max_drawdown: metrics::max_drawdown(equity),
            max_drawdown_ratio: metrics::max_drawdown_ratio(equity),
            trades: result.trades.len(),
            equity_curve: equity.clone(),
            actions: actions.iter().map(|a| *a as u8).collect(),
        }
    }

    /// Count of BUY, SELL, HOLD decisions
    pub fn action_distribution(&self) -> [usize; NUM_ACTIONS] {
        let decoded: Vec<Action> = self
            .actions
            .iter()
            .filter_map(|a| Action::from_index(*a as usize))
            .collect();
        action_distribution(&decoded)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Per-tick CSV: `step,price,action,equity`
    pub fn write_equity_csv<P: AsRef<Path>>(&self, path: P, prices: &[f64]) -> Result<()> {
        if prices.len() != self.equity_curve.len() {
            return Err(QTraderError::InputLengthMismatch {
                prices: prices.len(),
                actions: self.equity_curve.len(),
            });
        }

        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["step", "price", "action", "equity"])?;
        for (i, (price, equity)) in prices.iter().zip(self.equity_curve.iter()).enumerate() {
            let action = self
                .actions
                .get(i)
                .and_then(|a| Action::from_index(*a as usize))
                .unwrap_or_default();
            writer.write_record(&[
                i.to_string(),
                price.to_string(),
                action.as_str().to_string(),
                equity.to_string(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// One row of a model comparison table
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct ComparisonRow {
    #[tabled(rename = "Model")]
    pub model: String,
    #[tabled(rename = "PnL")]
    pub pnl: String,
    #[tabled(rename = "Sharpe")]
    pub sharpe: String,
    #[tabled(rename = "Win Rate")]
    pub win_rate: String,
    #[tabled(rename = "Max DD")]
    pub max_drawdown: String,
    #[tabled(rename = "Trades")]
    pub trades: usize,
    #[tabled(rename = "BUY")]
    pub buys: usize,
    #[tabled(rename = "SELL")]
    pub sells: usize,
    #[tabled(rename = "HOLD")]
    pub holds: usize,
}

impl ComparisonRow {
    pub fn new(model: impl Into<String>, report: &BacktestReport) -> Self {
        let [buys, sells, holds] = report.action_distribution();
        Self {
            model: model.into(),
            pnl: format!("{:.4}", report.pnl),
            sharpe: format!("{:.4}", report.sharpe_ratio),
            win_rate: format!("{:.4}", report.win_rate),
            max_drawdown: format!("{:.4}", report.max_drawdown),
            trades: report.trades,
            buys,
            sells,
            holds,
        }
    }
}

/// Render rows as a text table
pub fn render_comparison(rows: &[ComparisonRow]) -> String {
    if rows.is_empty() {
        return "(no results)".to_string();
    }
    Table::new(rows).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::evaluation::simulator::PositionSimulator;
    use std::env::temp_dir;

    fn sample_report() -> BacktestReport {
        let prices = [100.0, 102.0, 101.0, 105.0, 103.0, 107.0];
        let actions = [
            Action::Buy,
            Action::Hold,
            Action::Hold,
            Action::Sell,
            Action::Buy,
            Action::Sell,
        ];
        let result = PositionSimulator::run(&prices, &actions).unwrap();
        BacktestReport::from_simulation(&result, &actions)
    }

    #[test]
    fn test_report_keys() {
        let report = sample_report();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["PnL"], 9.0);
        assert_eq!(json["Win Rate"], 1.0);
        assert!(json.get("Sharpe Ratio").is_some());
        assert_eq!(json["actions"], serde_json::json!([0, 2, 2, 1, 0, 1]));
        assert_eq!(report.action_distribution(), [2, 2, 2]);
    }

    #[test]
    fn test_comparison_table() {
        let report = sample_report();
        let rows = vec![ComparisonRow::new("dqn", &report)];
        let table = render_comparison(&rows);
        assert!(table.contains("dqn"));
        assert!(table.contains("9.0000"));
        assert!(table.contains("Win Rate"));
        assert_eq!(render_comparison(&[]), "(no results)");
    }

    #[test]
    fn test_equity_csv() {
        let report = sample_report();
        let path = temp_dir().join("qtrader_equity.csv");
        report
            .write_equity_csv(&path, &[100.0, 102.0, 101.0, 105.0, 103.0, 107.0])
            .unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "step,price,action,equity");
        assert_eq!(lines[4], "3,105,SELL,5");
        assert_eq!(lines.len(), 7);
        assert!(report.write_equity_csv(&path, &[1.0]).is_err());
        let _ = fs::remove_file(&path);
    }
}
