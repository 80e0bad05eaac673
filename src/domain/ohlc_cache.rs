//! Close-price cache aligned on one shared trading-day axis.
//!
//! Every registered ticker's closes are placed on the anchor calendar so that
//! axis index `i` means the same trading day for every series. A ticker whose
//! history starts later is left-padded with `None`; an interior gap after its
//! first close carries the previous close forward.

use crate::domain::bar::DailyClose;
use crate::domain::error::TreeTraderError;
use crate::domain::parser::ParsedStrategy;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateBounds {
    /// First day of the lookback window.
    pub indicator_start: NaiveDate,
    pub tradeable_start: NaiveDate,
    pub tradeable_end: NaiveDate,
}

/// The ticker whose calendar defines the shared axis.
pub fn anchor_ticker(parsed: &ParsedStrategy) -> Option<&String> {
    parsed
        .lookback_assets
        .iter()
        .next()
        .or_else(|| parsed.tradeable_assets.iter().next())
}

#[derive(Debug, Clone)]
pub struct OhlcCache {
    dates: Vec<NaiveDate>,
    date_index: HashMap<NaiveDate, usize>,
    series: HashMap<String, Vec<Option<f64>>>,
    tradeable_start_index: usize,
}

impl OhlcCache {
    /// Fetch and align closes for every ticker the strategy references.
    ///
    /// Lookback tickers are fetched from `indicator_start`; tickers that are
    /// only traded are fetched from `tradeable_start`.
    pub fn load(
        port: &dyn DataPort,
        parsed: &ParsedStrategy,
        bounds: &DateBounds,
    ) -> Result<Self, TreeTraderError> {
        let anchor = anchor_ticker(parsed).ok_or_else(|| TreeTraderError::InsufficientData {
            reason: "strategy references no tickers".into(),
        })?;
        let dates = port.trading_dates(anchor, bounds.indicator_start, bounds.tradeable_end)?;

        let mut raw = port.fetch_closes(
            &parsed.lookback_assets,
            bounds.indicator_start,
            bounds.tradeable_end,
        )?;
        let tradeable_only = parsed.tradeable_only_assets();
        if !tradeable_only.is_empty() {
            raw.extend(port.fetch_closes(
                &tradeable_only,
                bounds.tradeable_start,
                bounds.tradeable_end,
            )?);
        }

        let series = parsed
            .assets
            .iter()
            .map(|ticker| {
                let closes = raw.get(ticker).map(Vec::as_slice).unwrap_or(&[]);
                (ticker.clone(), align(&dates, closes))
            })
            .collect::<HashMap<_, _>>();

        let tradeable_start_index = dates.partition_point(|d| *d < bounds.tradeable_start);
        tracing::info!(
            tickers = series.len(),
            days = dates.len(),
            tradeable_start_index,
            anchor = %anchor,
            "loaded close series"
        );

        Ok(Self::build(dates, series, tradeable_start_index))
    }

    /// Build from pre-aligned in-memory series. Each series must be as long
    /// as `dates`.
    pub fn from_series(
        dates: Vec<NaiveDate>,
        series: HashMap<String, Vec<Option<f64>>>,
        tradeable_start_index: usize,
    ) -> Result<Self, TreeTraderError> {
        if let Some((ticker, values)) = series.iter().find(|(_, v)| v.len() != dates.len()) {
            return Err(TreeTraderError::Data {
                reason: format!(
                    "series {} has {} entries, expected {}",
                    ticker,
                    values.len(),
                    dates.len()
                ),
            });
        }
        Ok(Self::build(dates, series, tradeable_start_index))
    }

    fn build(
        dates: Vec<NaiveDate>,
        series: HashMap<String, Vec<Option<f64>>>,
        tradeable_start_index: usize,
    ) -> Self {
        let date_index = dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();
        Self {
            dates,
            date_index,
            series,
            tradeable_start_index,
        }
    }

    pub fn get_bars(&self, ticker: &str) -> Result<&[Option<f64>], TreeTraderError> {
        self.series
            .get(ticker)
            .map(Vec::as_slice)
            .ok_or_else(|| TreeTraderError::TickerNotLoaded {
                ticker: ticker.to_string(),
            })
    }

    /// Close of `ticker` at `index`; `None` when the ticker has no data yet
    /// or the index lies past the end of the axis.
    pub fn get_bar_for_index(&self, ticker: &str, index: usize) -> Result<Option<f64>, TreeTraderError> {
        Ok(self.get_bars(ticker)?.get(index).copied().flatten())
    }

    pub fn has_bars_for_index(&self, index: usize) -> bool {
        self.series
            .values()
            .any(|s| s.get(index).is_some_and(Option::is_some))
    }

    pub fn get_dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn date_at(&self, index: usize) -> Option<NaiveDate> {
        self.dates.get(index).copied()
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.date_index.get(&date).copied()
    }

    pub fn get_max_length(&self) -> usize {
        self.dates.len()
    }

    pub fn tradeable_start_index(&self) -> usize {
        self.tradeable_start_index
    }

    pub fn first_index_with_data(&self, ticker: &str) -> Option<usize> {
        self.series.get(ticker)?.iter().position(Option::is_some)
    }
}

/// Place `closes` on the `dates` axis, forward-filling between the first and
/// last close.
fn align(dates: &[NaiveDate], closes: &[DailyClose]) -> Vec<Option<f64>> {
    let (Some(first), Some(last)) = (closes.first(), closes.last()) else {
        return vec![None; dates.len()];
    };
    let by_date: HashMap<NaiveDate, f64> = closes.iter().map(|c| (c.date, c.close)).collect();

    let mut carried = None;
    dates
        .iter()
        .map(|date| {
            if *date < first.date || *date > last.date {
                return None;
            }
            if let Some(close) = by_date.get(date) {
                carried = Some(*close);
            }
            carried
        })
        .collect()
}
