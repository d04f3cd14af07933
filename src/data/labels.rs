//! Direction labels for supervised datasets, in the canonical action
//! encoding (BUY=0, SELL=1, HOLD=2).

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::domain::Tick;
use crate::error::Result;
use crate::rl::core::{action_distribution, Action, NUM_ACTIONS};

/// Relative move inside which a tick is labeled HOLD
pub const DEFAULT_THRESHOLD: f64 = 0.00001;

#[derive(Debug, Clone, Serialize)]
struct LabeledRow<'a> {
    timestamp: f64,
    symbol: &'a str,
    price: f64,
    volume: f64,
    label: u8,
}

/// Label for each tick after the first: BUY when the relative change from
/// the previous price exceeds `threshold`, SELL below `-threshold`, HOLD
/// otherwise (and whenever the change is undefined).
pub fn direction_labels(prices: &[f64], threshold: f64) -> Vec<Action> {
    prices
        .windows(2)
        .map(|w| {
            let change = (w[1] - w[0]) / w[0];
            if !change.is_finite() {
                Action::Hold
            } else if change > threshold {
                Action::Buy
            } else if change < -threshold {
                Action::Sell
            } else {
                Action::Hold
            }
        })
        .collect()
}

/// `data/btc.csv` -> `data/btc_labeled.csv`
pub fn labeled_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "series".to_string());
    input.with_file_name(format!("{stem}_labeled.csv"))
}

/// Write ticks `1..n` with their direction label. Returns the label counts.
pub fn write_labeled_csv<P: AsRef<Path>>(
    path: P,
    ticks: &[Tick],
    threshold: f64,
) -> Result<[usize; NUM_ACTIONS]> {
    let prices: Vec<f64> = ticks.iter().map(|t| t.price).collect();
    let labels = direction_labels(&prices, threshold);

    let mut writer = csv::Writer::from_path(path.as_ref())?;
    for (tick, label) in ticks.iter().skip(1).zip(labels.iter()) {
        writer.serialize(LabeledRow {
            timestamp: tick.timestamp,
            symbol: &tick.symbol,
            price: tick.price,
            volume: tick.volume,
            label: label.to_index() as u8,
        })?;
    }
    writer.flush()?;

    let counts = action_distribution(&labels);
    info!(
        "Saved labeled dataset to {:?}: BUY {}, SELL {}, HOLD {}",
        path.as_ref(),
        counts[0],
        counts[1],
        counts[2]
    );
    Ok(counts)
}
