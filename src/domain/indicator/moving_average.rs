//! Simple moving average over closes.

pub fn calculate_moving_average(closes: &[f64], period: usize) -> Vec<f64> {
    closes.windows(period).map(mean).collect()
}

pub(crate) fn mean(window: &[f64]) -> f64 {
    window.iter().sum::<f64>() / window.len() as f64
}
