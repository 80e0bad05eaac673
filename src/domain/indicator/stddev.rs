//! Standard Deviation over closes.
//!
//! Population standard deviation over n closing prices.
//! STDDEV(n)[i] = sqrt(sum((C[i-j] - SMA(n)[i])^2 for j in 0..n-1) / n)

use super::moving_average::mean;

pub fn calculate_stddev(closes: &[f64], period: usize) -> Vec<f64> {
    closes.windows(period).map(population_stddev).collect()
}

pub(crate) fn population_stddev(window: &[f64]) -> f64 {
    let avg = mean(window);
    let variance: f64 = window
        .iter()
        .map(|v| {
            let diff = v - avg;
            diff * diff
        })
        .sum::<f64>()
        / window.len() as f64;
    variance.sqrt()
}
