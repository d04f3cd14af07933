//! `qtrader labels`

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::data::labels::DEFAULT_THRESHOLD;
use crate::data::{labeled_path, load_ticks, sort_by_timestamp, write_labeled_csv};

#[derive(Args, Debug)]
pub struct LabelsArgs {
    /// CSV tick series
    #[arg(short, long)]
    pub data: PathBuf,

    /// Relative move inside which a tick is labeled HOLD
    #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: f64,

    /// Output path (default: <data>_labeled.csv)
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

impl LabelsArgs {
    pub fn run(self, config: AppConfig) -> Result<PathBuf> {
        let mut ticks = load_ticks(&self.data, &config.data.symbol)
            .with_context(|| format!("Failed to load {}", self.data.display()))?;
        sort_by_timestamp(&mut ticks);

        let out = self.out.unwrap_or_else(|| labeled_path(&self.data));
        let [buys, sells, holds] = write_labeled_csv(&out, &ticks, self.threshold)?;
        println!(
            "  Wrote {} (BUY {}, SELL {}, HOLD {})",
            out.display(),
            buys,
            sells,
            holds
        );
        Ok(out)
    }
}
