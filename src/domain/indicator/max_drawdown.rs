//! Maximum drawdown within a trailing window, in percent (positive number).

pub fn calculate_max_drawdown(closes: &[f64], period: usize) -> Vec<f64> {
    closes.windows(period).map(window_drawdown).collect()
}

/// Largest running peak-to-current decline across `values`.
pub(crate) fn window_drawdown(values: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;
    for &v in values {
        if v > peak {
            peak = v;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - v) / peak * 100.0);
        }
    }
    max_dd
}
