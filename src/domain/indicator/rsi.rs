//! RSI (Relative Strength Index) over closes.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - Seed: simple mean of gains/losses over the first n changes
//! - Each output i >= n applies change (C[i] - C[i-1]):
//!   avg = (prev_avg * (n-1) + current) / n
//!
//! The first output (offset n) therefore smooths the seed with the last change
//! the seed already contains.
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100

pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let mut gains: Vec<f64> = Vec::with_capacity(closes.len().saturating_sub(1));
    let mut losses: Vec<f64> = Vec::with_capacity(closes.len().saturating_sub(1));

    for pair in closes.windows(2) {
        let change = pair[1] - pair[0];
        gains.push(if change > 0.0 { change } else { 0.0 });
        losses.push(if change < 0.0 { -change } else { 0.0 });
    }

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;

    let mut values = Vec::with_capacity(closes.len() - period);
    for i in period..closes.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i - 1]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i - 1]) / period as f64;
        let rsi = if avg_loss == 0.0 {
            100.0
        } else {
            100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
        };
        values.push(rsi);
    }

    values
}
