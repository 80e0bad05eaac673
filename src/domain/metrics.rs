//! Performance metrics over a daily balance series.
//!
//! All ratios of returns are reported in percent.

use serde::Serialize;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const TRADING_DAYS_PER_MONTH: usize = 21;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub cumulative_return: f64,
    pub annualized_return: f64,
    /// Annualised standard deviation of daily returns.
    pub standard_deviation: f64,
    pub max_drawdown: f64,
    pub calmar: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub trailing_1_month: f64,
    pub trailing_3_month: f64,
}

impl Metrics {
    /// `balances` holds one marked balance per evaluated trading day, the
    /// first being the starting balance.
    pub fn compute(balances: &[f64], risk_free_rate: f64) -> Self {
        let (Some(&first), Some(&last)) = (balances.first(), balances.last()) else {
            return Self::default();
        };

        let cumulative_return = percent_change(first, last);

        let years = (balances.len() - 1) as f64 / TRADING_DAYS_PER_YEAR;
        let growth = last / first;
        let annualized_return = if years > 0.0 && growth > 0.0 && growth.is_finite() {
            (growth.powf(1.0 / years) - 1.0) * 100.0
        } else {
            0.0
        };

        let max_drawdown = compute_drawdown(balances);
        let calmar = if max_drawdown > 0.0 {
            annualized_return / max_drawdown
        } else {
            0.0
        };

        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let (stddev, sharpe, sortino) = compute_risk_adjusted(balances, daily_rf);

        Metrics {
            cumulative_return,
            annualized_return,
            standard_deviation: stddev * TRADING_DAYS_PER_YEAR.sqrt() * 100.0,
            max_drawdown,
            calmar,
            sharpe,
            sortino,
            trailing_1_month: trailing_return(balances, TRADING_DAYS_PER_MONTH),
            trailing_3_month: trailing_return(balances, 3 * TRADING_DAYS_PER_MONTH),
        }
    }
}

fn percent_change(from: f64, to: f64) -> f64 {
    if from > 0.0 {
        (to - from) / from * 100.0
    } else {
        0.0
    }
}

/// Return over the last `days` steps, or over the whole series when shorter.
fn trailing_return(balances: &[f64], days: usize) -> f64 {
    let Some(&last) = balances.last() else {
        return 0.0;
    };
    let start = balances.len().saturating_sub(days + 1);
    percent_change(balances[start], last)
}

fn compute_drawdown(balances: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;

    for &balance in balances {
        if balance > peak {
            peak = balance;
        } else if peak > 0.0 {
            let dd = (peak - balance) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd * 100.0
}

/// Daily stddev (fraction), annualised Sharpe and Sortino.
fn compute_risk_adjusted(balances: &[f64], daily_rf: f64) -> (f64, f64, f64) {
    if balances.len() < 2 {
        return (0.0, 0.0, 0.0);
    }

    let returns: Vec<f64> = balances
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect();

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;

    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    let excess_return = mean - daily_rf;

    let sharpe = if stddev > 0.0 {
        (excess_return / stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    let downside: f64 = returns
        .iter()
        .filter(|&&r| r < daily_rf)
        .map(|&r| (r - daily_rf).powi(2))
        .sum();
    let downside_stddev = (downside / n).sqrt();

    let sortino = if downside_stddev > 0.0 {
        (excess_return / downside_stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    (stddev, sharpe, sortino)
}
