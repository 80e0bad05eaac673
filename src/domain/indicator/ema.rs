//! Exponential Moving Average over closes.
//!
//! k = 2/(n+1), seeded with the first close, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! The first n-1 values are dropped.

pub fn calculate_ema(closes: &[f64], period: usize) -> Vec<f64> {
    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = closes[0];

    let mut values = Vec::with_capacity(closes.len() + 1 - period);
    for (i, &close) in closes.iter().enumerate() {
        if i > 0 {
            ema = close * k + ema * (1.0 - k);
        }
        if i + 1 >= period {
            values.push(ema);
        }
    }

    values
}
