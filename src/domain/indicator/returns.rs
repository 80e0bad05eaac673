//! Statistics over 1-period percent returns of a close sequence.
//!
//! R[i] = (C[i] - C[i-1]) / C[i-1] * 100, and output i >= n covers R[i-n+1..=i].

use super::moving_average::mean;
use super::stddev::population_stddev;

pub fn calculate_moving_average_return(closes: &[f64], period: usize) -> Vec<f64> {
    percent_returns(closes).windows(period).map(mean).collect()
}

pub fn calculate_stddev_return(closes: &[f64], period: usize) -> Vec<f64> {
    percent_returns(closes)
        .windows(period)
        .map(population_stddev)
        .collect()
}

pub(crate) fn percent_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .map(|w| {
            if w[0] == 0.0 {
                0.0
            } else {
                (w[1] - w[0]) / w[0] * 100.0
            }
        })
        .collect()
}
