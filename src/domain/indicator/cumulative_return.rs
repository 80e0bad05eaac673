//! Cumulative return over a trailing window, in percent.
//!
//! CR(n)[i] = (C[i] - C[i-n]) / C[i-n] * 100

pub fn calculate_cumulative_return(closes: &[f64], period: usize) -> Vec<f64> {
    closes
        .iter()
        .zip(&closes[period..])
        .map(|(&base, &close)| {
            if base == 0.0 {
                0.0
            } else {
                (close - base) / base * 100.0
            }
        })
        .collect()
}
