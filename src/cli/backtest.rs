//! `qtrader eval` and `qtrader compare`

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::info;

use super::model::LoadedModel;
use crate::config::AppConfig;
use crate::data::load_series;
use crate::domain::prices;
use crate::rl::evaluation::{render_comparison, BacktestReport, ComparisonRow};

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// CSV tick series
    #[arg(short, long)]
    pub data: PathBuf,

    /// Saved model
    #[arg(short, long)]
    pub model: PathBuf,

    /// Print the report as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Write the JSON report to this path
    #[arg(long)]
    pub report_out: Option<PathBuf>,

    /// Write the per-tick equity curve as CSV
    #[arg(long)]
    pub equity_csv: Option<PathBuf>,
}

impl EvalArgs {
    pub fn run(self, config: AppConfig) -> Result<BacktestReport> {
        let ticks = load_series(&self.data, &config.data)
            .with_context(|| format!("Failed to load {}", self.data.display()))?;
        let model = LoadedModel::open(&self.model)?;
        info!("Evaluating {} on {} ticks", model.architecture(), ticks.len());

        let report = model.evaluate(&ticks)?;

        if let Some(path) = &self.report_out {
            report.save_json(path)?;
            info!("Report written to {:?}", path);
        }
        if let Some(path) = &self.equity_csv {
            report.write_equity_csv(path, &prices(&ticks))?;
            info!("Equity curve written to {:?}", path);
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&self.model.display().to_string(), &report);
        }
        Ok(report)
    }
}

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// CSV tick series
    #[arg(short, long)]
    pub data: PathBuf,

    /// Saved models to compare (repeat the flag)
    #[arg(short, long = "model", required = true, num_args = 1..)]
    pub models: Vec<PathBuf>,
}

impl CompareArgs {
    pub fn run(self, config: AppConfig) -> Result<Vec<ComparisonRow>> {
        let ticks = load_series(&self.data, &config.data)
            .with_context(|| format!("Failed to load {}", self.data.display()))?;

        let mut rows = Vec::with_capacity(self.models.len());
        for path in &self.models {
            let model = LoadedModel::open(path)?;
            let report = model.evaluate(&ticks)?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            rows.push(ComparisonRow::new(name, &report));
        }

        println!("{}", render_comparison(&rows));
        Ok(rows)
    }
}

fn print_report(model: &str, report: &BacktestReport) {
    let [buys, sells, holds] = report.action_distribution();
    println!("\n  Backtest: {}", model);
    println!("  PnL:                {:.6}", report.pnl);
    println!("  Sharpe Ratio:       {:.6}", report.sharpe_ratio);
    println!("  Win Rate:           {:.4}", report.win_rate);
    println!("  Max Drawdown:       {:.6}", report.max_drawdown);
    println!("  Max Drawdown Ratio: {:.6}", report.max_drawdown_ratio);
    println!("  Trades:             {}", report.trades);
    println!("  Actions:            BUY {} / SELL {} / HOLD {}\n", buys, sells, holds);
}
