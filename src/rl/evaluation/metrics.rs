//! Performance metrics over an equity curve.
//!
//! Every degenerate case (no trades, zero variance, non-positive peak)
//! resolves to `0.0`.

use super::simulator::Trade;

/// Standard deviations below this are treated as zero
const STD_EPSILON: f64 = 1e-12;

/// Sum of realized trade PnLs
pub fn total_pnl(trades: &[Trade]) -> f64 {
    trades.iter().map(|t| t.pnl).sum()
}

/// Winning closes over all closes; 0 with no closes
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_win()).count() as f64 / trades.len() as f64
}

/// First differences of the equity curve
pub fn equity_deltas(equity: &[f64]) -> Vec<f64> {
    equity.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Mean over population std of per-step equity changes, not annualized.
/// 0 with fewer than two changes or zero spread.
pub fn sharpe_ratio(equity: &[f64]) -> f64 {
    let deltas = equity_deltas(equity);
    if deltas.len() < 2 {
        return 0.0;
    }

    let n = deltas.len() as f64;
    let mean = deltas.iter().sum::<f64>() / n;
    let variance = deltas.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();
    if !std.is_finite() || std < STD_EPSILON {
        return 0.0;
    }
    mean / std
}

/// Most negative `equity - running_peak` (0 or less)
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst: f64 = 0.0;
    for &e in equity {
        peak = peak.max(e);
        worst = worst.min(e - peak);
    }
    worst
}

/// Most negative `(equity - peak) / peak`, counting only points where the
/// running peak is positive
pub fn max_drawdown_ratio(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst: f64 = 0.0;
    for &e in equity {
        peak = peak.max(e);
        if peak > 0.0 {
            worst = worst.min((e - peak) / peak);
        }
    }
    worst
}
