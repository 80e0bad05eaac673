//! Technical indicator functions over close-price sequences.
//!
//! This module provides:
//! - `IndicatorFunction`: the supported indicator families, named as they
//!   appear in strategy trees (`"relative-strength-index"`, ...)
//! - `IndicatorKey`: indicator identity (ticker, function, window), used as a cache key
//! - `IndicatorSeries`: a left-trimmed output sequence anchored on the shared time axis
//!
//! Every function takes a close sequence plus a window and returns a shorter
//! sequence whose element 0 corresponds to input offset
//! [`IndicatorFunction::first_valid_offset`].

pub mod cumulative_return;
pub mod ema;
pub mod max_drawdown;
pub mod moving_average;
pub mod returns;
pub mod rsi;
pub mod stddev;

use crate::domain::error::TreeTraderError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum IndicatorFunction {
    MovingAveragePrice,
    ExponentialMovingAveragePrice,
    StandardDeviationPrice,
    CumulativeReturn,
    RelativeStrengthIndex,
    MaxDrawdown,
    MovingAverageReturn,
    StandardDeviationReturn,
}

impl IndicatorFunction {
    pub fn name(&self) -> &'static str {
        match self {
            IndicatorFunction::MovingAveragePrice => "moving-average-price",
            IndicatorFunction::ExponentialMovingAveragePrice => "exponential-moving-average-price",
            IndicatorFunction::StandardDeviationPrice => "standard-deviation-price",
            IndicatorFunction::CumulativeReturn => "cumulative-return",
            IndicatorFunction::RelativeStrengthIndex => "relative-strength-index",
            IndicatorFunction::MaxDrawdown => "max-drawdown",
            IndicatorFunction::MovingAverageReturn => "moving-average-return",
            IndicatorFunction::StandardDeviationReturn => "standard-deviation-return",
        }
    }

    /// Input offset of the first output element.
    pub fn first_valid_offset(&self, window: usize) -> usize {
        match self {
            IndicatorFunction::MovingAveragePrice
            | IndicatorFunction::ExponentialMovingAveragePrice
            | IndicatorFunction::StandardDeviationPrice
            | IndicatorFunction::MaxDrawdown => window.saturating_sub(1),
            IndicatorFunction::CumulativeReturn
            | IndicatorFunction::RelativeStrengthIndex
            | IndicatorFunction::MovingAverageReturn
            | IndicatorFunction::StandardDeviationReturn => window,
        }
    }

    pub fn calculate(&self, closes: &[f64], window: usize) -> Result<Vec<f64>, TreeTraderError> {
        check_input(self.name(), closes.len(), window, self.first_valid_offset(window) + 1)?;
        let values = match self {
            IndicatorFunction::MovingAveragePrice => {
                moving_average::calculate_moving_average(closes, window)
            }
            IndicatorFunction::ExponentialMovingAveragePrice => ema::calculate_ema(closes, window),
            IndicatorFunction::StandardDeviationPrice => stddev::calculate_stddev(closes, window),
            IndicatorFunction::CumulativeReturn => {
                cumulative_return::calculate_cumulative_return(closes, window)
            }
            IndicatorFunction::RelativeStrengthIndex => rsi::calculate_rsi(closes, window),
            IndicatorFunction::MaxDrawdown => max_drawdown::calculate_max_drawdown(closes, window),
            IndicatorFunction::MovingAverageReturn => {
                returns::calculate_moving_average_return(closes, window)
            }
            IndicatorFunction::StandardDeviationReturn => {
                returns::calculate_stddev_return(closes, window)
            }
        };
        Ok(values)
    }
}

impl fmt::Display for IndicatorFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IndicatorFunction {
    type Err = TreeTraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "moving-average-price" => Ok(IndicatorFunction::MovingAveragePrice),
            "exponential-moving-average-price" => Ok(IndicatorFunction::ExponentialMovingAveragePrice),
            "standard-deviation-price" => Ok(IndicatorFunction::StandardDeviationPrice),
            "cumulative-return" => Ok(IndicatorFunction::CumulativeReturn),
            "relative-strength-index" => Ok(IndicatorFunction::RelativeStrengthIndex),
            "max-drawdown" => Ok(IndicatorFunction::MaxDrawdown),
            "moving-average-return" => Ok(IndicatorFunction::MovingAverageReturn),
            "standard-deviation-return" => Ok(IndicatorFunction::StandardDeviationReturn),
            other => Err(TreeTraderError::UnknownFunction {
                name: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for IndicatorFunction {
    type Error = TreeTraderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IndicatorFunction> for String {
    fn from(value: IndicatorFunction) -> Self {
        value.name().to_string()
    }
}

/// Indicator identity. Displays as `ticker|fn|window`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndicatorKey {
    pub ticker: String,
    pub function: IndicatorFunction,
    pub window: usize,
}

impl IndicatorKey {
    pub fn new(ticker: impl Into<String>, function: IndicatorFunction, window: usize) -> Self {
        Self {
            ticker: ticker.into(),
            function,
            window,
        }
    }
}

impl fmt::Display for IndicatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.ticker, self.function, self.window)
    }
}

/// A trimmed output sequence placed on the shared time axis: `values[0]`
/// belongs to axis index `start_index`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub start_index: usize,
    pub values: Vec<f64>,
}

impl IndicatorSeries {
    pub fn value_at(&self, index: usize) -> Option<f64> {
        index
            .checked_sub(self.start_index)
            .and_then(|i| self.values.get(i).copied())
    }

    /// One past the last axis index with a value.
    pub fn end_index(&self) -> usize {
        self.start_index + self.values.len()
    }
}

pub(crate) fn check_input(
    function: &str,
    len: usize,
    window: usize,
    need: usize,
) -> Result<(), TreeTraderError> {
    if window == 0 {
        return Err(TreeTraderError::InvalidWindow {
            function: function.to_string(),
        });
    }
    if len < need {
        return Err(TreeTraderError::NotEnoughData {
            function: function.to_string(),
            have: len,
            need,
        });
    }
    Ok(())
}
