//! Pre-calc functions: statistics over a synthetic percent-return sequence.
//!
//! Same families as the price indicators, but the input is already a return
//! series (one element per simulated day), so no differencing happens here and
//! every function's first output sits at input offset n-1.

use crate::domain::error::TreeTraderError;
use crate::domain::indicator::check_input;
use crate::domain::indicator::max_drawdown::window_drawdown;
use crate::domain::indicator::moving_average::mean;
use crate::domain::indicator::stddev::population_stddev;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PreCalcFunction {
    StandardDeviationReturn,
    MovingAverageReturn,
    CumulativeReturn,
    MaxDrawdown,
}

impl PreCalcFunction {
    pub fn name(&self) -> &'static str {
        match self {
            PreCalcFunction::StandardDeviationReturn => "standard-deviation-return",
            PreCalcFunction::MovingAverageReturn => "moving-average-return",
            PreCalcFunction::CumulativeReturn => "cumulative-return",
            PreCalcFunction::MaxDrawdown => "max-drawdown",
        }
    }

    pub fn first_valid_offset(&self, window: usize) -> usize {
        window.saturating_sub(1)
    }

    pub fn calculate(&self, returns: &[f64], window: usize) -> Result<Vec<f64>, TreeTraderError> {
        check_input(self.name(), returns.len(), window, window)?;
        let windows = returns.windows(window);
        let values: Vec<f64> = match self {
            PreCalcFunction::StandardDeviationReturn => windows.map(population_stddev).collect(),
            PreCalcFunction::MovingAverageReturn => windows.map(mean).collect(),
            PreCalcFunction::CumulativeReturn => windows
                .map(|w| (w.iter().fold(1.0, |acc, r| acc * (1.0 + r / 100.0)) - 1.0) * 100.0)
                .collect(),
            PreCalcFunction::MaxDrawdown => windows.map(|w| window_drawdown(&equity_curve(w))).collect(),
        };
        Ok(values)
    }
}

/// Compounded equity starting at 1.0 before the first return.
fn equity_curve(returns: &[f64]) -> Vec<f64> {
    let mut equity = Vec::with_capacity(returns.len() + 1);
    let mut current = 1.0;
    equity.push(current);
    for r in returns {
        current *= 1.0 + r / 100.0;
        equity.push(current);
    }
    equity
}

impl fmt::Display for PreCalcFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PreCalcFunction {
    type Err = TreeTraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard-deviation-return" => Ok(PreCalcFunction::StandardDeviationReturn),
            "moving-average-return" => Ok(PreCalcFunction::MovingAverageReturn),
            "cumulative-return" => Ok(PreCalcFunction::CumulativeReturn),
            "max-drawdown" => Ok(PreCalcFunction::MaxDrawdown),
            other => Err(TreeTraderError::UnknownFunction {
                name: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for PreCalcFunction {
    type Error = TreeTraderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PreCalcFunction> for String {
    fn from(value: PreCalcFunction) -> Self {
        value.name().to_string()
    }
}
