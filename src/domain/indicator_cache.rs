//! Pre-computed indicator series keyed by [`IndicatorKey`].

use crate::domain::error::TreeTraderError;
use crate::domain::indicator::{IndicatorKey, IndicatorSeries};
use crate::domain::ohlc_cache::OhlcCache;
use rayon::prelude::*;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct IndicatorCache {
    series: HashMap<IndicatorKey, IndicatorSeries>,
}

impl IndicatorCache {
    /// Compute every indicator once, in parallel, over its ticker's closes.
    pub fn load(ohlc: &OhlcCache, keys: &[IndicatorKey]) -> Result<Self, TreeTraderError> {
        let series = keys
            .par_iter()
            .map(|key| compute(ohlc, key).map(|s| (key.clone(), s)))
            .collect::<Result<HashMap<_, _>, _>>()?;
        tracing::info!(indicators = series.len(), "loaded indicators");
        Ok(Self { series })
    }

    pub fn from_series(series: HashMap<IndicatorKey, IndicatorSeries>) -> Self {
        Self { series }
    }

    pub fn get_indicator_value(&self, key: &IndicatorKey, index: usize) -> Result<f64, TreeTraderError> {
        let series = self
            .series
            .get(key)
            .ok_or_else(|| TreeTraderError::UnknownIndicator {
                key: key.to_string(),
            })?;
        if index < series.start_index {
            return Err(TreeTraderError::LookbackNotAvailable {
                key: key.to_string(),
                index,
                first_valid: series.start_index,
            });
        }
        series
            .value_at(index)
            .ok_or_else(|| TreeTraderError::InsufficientData {
                reason: format!("{} has no value at index {} (series ends at {})", key, index, series.end_index()),
            })
    }

    pub fn get_series(&self, key: &IndicatorKey) -> Option<&IndicatorSeries> {
        self.series.get(key)
    }

    /// First axis index at which every loaded indicator has a value.
    pub fn first_complete_index(&self) -> usize {
        self.series
            .values()
            .map(|s| s.start_index)
            .max()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

fn compute(ohlc: &OhlcCache, key: &IndicatorKey) -> Result<IndicatorSeries, TreeTraderError> {
    let bars = ohlc.get_bars(&key.ticker)?;
    let leading = bars.iter().take_while(|c| c.is_none()).count();
    let closes: Vec<f64> = bars[leading..].iter().map_while(|c| *c).collect();

    let values = key
        .function
        .calculate(&closes, key.window)
        .map_err(|e| match e {
            TreeTraderError::NotEnoughData { have, need, .. } => TreeTraderError::InsufficientData {
                reason: format!("{}: {} closes available, {} needed", key, have, need),
            },
            other => other,
        })?;

    Ok(IndicatorSeries {
        start_index: leading + key.function.first_valid_offset(key.window),
        values,
    })
}
