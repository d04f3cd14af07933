//! CSV tick series loading and preprocessing.

use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::config::DataConfig;
use crate::domain::Tick;
use crate::error::{DataError, Result};

/// Columns every series must provide; `symbol` is optional
pub const REQUIRED_COLUMNS: [&str; 3] = ["timestamp", "price", "volume"];

/// Minimum series length for a training transition
pub const MIN_TICKS: usize = 2;

#[derive(Debug, Deserialize)]
struct Row {
    timestamp: f64,
    #[serde(default)]
    symbol: Option<String>,
    price: f64,
    volume: f64,
}

/// Parse ticks from CSV. Rows keep file order; `default_symbol` fills a
/// missing or empty `symbol` column.
pub fn read_ticks<R: Read>(reader: R, default_symbol: &str) -> Result<Vec<Tick>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers = reader.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(DataError::MissingColumn {
                column: column.to_string(),
            }
            .into());
        }
    }

    let mut ticks = Vec::new();
    for row in reader.deserialize::<Row>() {
        let row = row?;
        let symbol = row
            .symbol
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| default_symbol.to_string());
        ticks.push(Tick::new(row.timestamp, symbol, row.price, row.volume));
    }
    Ok(ticks)
}

pub fn load_ticks<P: AsRef<Path>>(path: P, default_symbol: &str) -> Result<Vec<Tick>> {
    let file = File::open(path.as_ref())?;
    let ticks = read_ticks(file, default_symbol)?;
    debug!("Read {} ticks from {:?}", ticks.len(), path.as_ref());
    Ok(ticks)
}

/// Stable sort by timestamp
pub fn sort_by_timestamp(ticks: &mut [Tick]) {
    ticks.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
}

/// Keep every `step`-th tick, starting with the first
pub fn downsample(ticks: &[Tick], step: usize) -> Result<Vec<Tick>> {
    if step == 0 {
        return Err(DataError::InvalidStep.into());
    }
    Ok(ticks.iter().step_by(step).cloned().collect())
}

/// Min-max scale finite values into `[0, 1]`. A constant series maps to 0;
/// non-finite values pass through unchanged.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    let (min, max) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    let range = max - min;

    values
        .iter()
        .map(|v| {
            if !v.is_finite() {
                *v
            } else if range > 0.0 {
                (v - min) / range
            } else {
                0.0
            }
        })
        .collect()
}

/// Min-max scale price and volume columns in place
pub fn normalize_ticks(ticks: &mut [Tick]) {
    let prices = normalize(&ticks.iter().map(|t| t.price).collect::<Vec<_>>());
    let volumes = normalize(&ticks.iter().map(|t| t.volume).collect::<Vec<_>>());
    for ((tick, p), v) in ticks.iter_mut().zip(prices).zip(volumes) {
        tick.price = p;
        tick.volume = v;
    }
}

pub fn ensure_min_ticks(ticks: &[Tick], required: usize) -> Result<()> {
    if ticks.len() < required {
        return Err(DataError::TooFewTicks {
            found: ticks.len(),
            required,
        }
        .into());
    }
    Ok(())
}

/// Load, sort, downsample and optionally normalize a series per `config`.
/// Fails with `DataInsufficient` when fewer than two ticks remain.
pub fn load_series<P: AsRef<Path>>(path: P, config: &DataConfig) -> Result<Vec<Tick>> {
    let mut ticks = load_ticks(&path, &config.symbol)?;
    sort_by_timestamp(&mut ticks);
    let mut ticks = downsample(&ticks, config.downsample)?;
    if config.normalize {
        normalize_ticks(&mut ticks);
    }
    ensure_min_ticks(&ticks, MIN_TICKS)?;

    info!(
        "Loaded {} ticks from {:?} (downsample {}, normalize {})",
        ticks.len(),
        path.as_ref(),
        config.downsample,
        config.normalize
    );
    Ok(ticks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QTraderError;
    use std::env::temp_dir;

    const CSV: &str = "timestamp,symbol,price,volume\n\
                       3,BTCUSDT,101.5,0.4\n\
                       1,BTCUSDT,100.0,0.2\n\
                       2,,100.5,0.3\n";

    #[test]
    fn test_read_ticks_fills_symbol() {
        let ticks = read_ticks(CSV.as_bytes(), "ETHUSDT").unwrap();
        assert_eq!(ticks.len(), 3);
        assert_eq!(ticks[0].timestamp, 3.0);
        assert_eq!(ticks[2].symbol, "ETHUSDT");
        assert_eq!(ticks[1].symbol, "BTCUSDT");
    }

    #[test]
    fn test_symbol_column_optional() {
        let ticks = read_ticks("timestamp,price,volume\n1,10,1\n".as_bytes(), "BTCUSDT").unwrap();
        assert_eq!(ticks[0].symbol, "BTCUSDT");
        assert_eq!(ticks[0].price, 10.0);
    }

    #[test]
    fn test_missing_column() {
        let err = read_ticks("timestamp,price\n1,2\n".as_bytes(), "BTCUSDT").unwrap_err();
        match err {
            QTraderError::Validation(msg) => assert!(msg.contains("volume")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_sort_and_downsample() {
        let mut ticks = read_ticks(CSV.as_bytes(), "BTCUSDT").unwrap();
        sort_by_timestamp(&mut ticks);
        let stamps: Vec<f64> = ticks.iter().map(|t| t.timestamp).collect();
        assert_eq!(stamps, vec![1.0, 2.0, 3.0]);

        let every_other = downsample(&ticks, 2).unwrap();
        assert_eq!(every_other.len(), 2);
        assert_eq!(every_other[1].timestamp, 3.0);
        assert!(downsample(&ticks, 0).is_err());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(&[2.0, 4.0, 3.0]), vec![0.0, 1.0, 0.5]);
        assert_eq!(normalize(&[5.0, 5.0]), vec![0.0, 0.0]);
        let with_nan = normalize(&[0.0, f64::NAN, 10.0]);
        assert_eq!(with_nan[2], 1.0);
        assert!(with_nan[1].is_nan());
    }

    #[test]
    fn test_load_series_rejects_single_tick() {
        let path = temp_dir().join("qtrader_single_tick.csv");
        std::fs::write(&path, "timestamp,symbol,price,volume\n1,BTCUSDT,100,1\n").unwrap();
        let err = load_series(&path, &DataConfig::default()).unwrap_err();
        assert!(matches!(err, QTraderError::DataInsufficient(_)));
        let _ = std::fs::remove_file(&path);
    }
}
