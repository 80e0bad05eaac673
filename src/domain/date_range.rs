//! Resolution of the requested date range into loadable bounds.

use crate::domain::error::TreeTraderError;
use crate::domain::ohlc_cache::{anchor_ticker, DateBounds};
use crate::domain::parser::ParsedStrategy;
use crate::ports::data_port::DataPort;
use chrono::{Datelike, Days, NaiveDate, Weekday};

/// Saturday and Sunday move forward to Monday.
pub fn roll_forward(date: NaiveDate) -> NaiveDate {
    let days = match date.weekday() {
        Weekday::Sat => 2,
        Weekday::Sun => 1,
        _ => 0,
    };
    date.checked_add_days(Days::new(days)).unwrap_or(date)
}

/// Saturday and Sunday move back to Friday.
pub fn roll_back(date: NaiveDate) -> NaiveDate {
    let days = match date.weekday() {
        Weekday::Sat => 1,
        Weekday::Sun => 2,
        _ => 0,
    };
    date.checked_sub_days(Days::new(days)).unwrap_or(date)
}

pub fn resolve_date_range(
    port: &dyn DataPort,
    parsed: &ParsedStrategy,
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
) -> Result<DateBounds, TreeTraderError> {
    let start = roll_forward(start);
    let end = roll_back(end.min(today));
    if start > end {
        return Err(TreeTraderError::InsufficientData {
            reason: format!("no trading days between {} and {}", start, end),
        });
    }

    let mut tradeable_start = start;
    let mut tradeable_end = end;
    let mut lookback_first = None;
    for ticker in &parsed.assets {
        let (first, last, _) = data_range(port, ticker)?;
        if parsed.tradeable_assets.contains(ticker) {
            tradeable_start = tradeable_start.max(first);
        }
        if parsed.lookback_assets.contains(ticker) {
            lookback_first = lookback_first.max(Some(first));
        }
        tradeable_end = tradeable_end.min(last);
    }
    if tradeable_start > tradeable_end {
        return Err(TreeTraderError::InsufficientData {
            reason: format!(
                "assets share no history in range (start {}, end {})",
                tradeable_start, tradeable_end
            ),
        });
    }

    let anchor = anchor_ticker(parsed).ok_or_else(|| TreeTraderError::InsufficientData {
        reason: "strategy references no tickers".into(),
    })?;
    let (anchor_first, _, _) = data_range(port, anchor)?;
    let calendar = port.trading_dates(anchor, anchor_first, tradeable_end)?;

    // indicator start may not precede any lookback ticker's first close
    let earliest_indicator = lookback_first.map_or(0, |first| calendar.partition_point(|d| *d < first));
    let lookback = parsed.required_lookback();
    let requested = calendar.partition_point(|d| *d < tradeable_start);
    let position = requested.max(earliest_indicator + lookback);
    if position >= calendar.len() {
        return Err(TreeTraderError::InsufficientData {
            reason: format!(
                "{} lookback days leave no trading days before {} on {}",
                lookback, tradeable_end, anchor
            ),
        });
    }
    if position > requested {
        tracing::info!(
            requested = %tradeable_start,
            clamped = %calendar[position],
            lookback,
            "start moved forward to fit lookback"
        );
    }
    let indicator_start = calendar[position - lookback];
    let tradeable_start = calendar[position];

    tracing::info!(
        %indicator_start,
        %tradeable_start,
        %tradeable_end,
        lookback,
        "resolved date range"
    );
    Ok(DateBounds {
        indicator_start,
        tradeable_start,
        tradeable_end,
    })
}

fn data_range(port: &dyn DataPort, ticker: &str) -> Result<(NaiveDate, NaiveDate, usize), TreeTraderError> {
    port.get_data_range(ticker)?
        .ok_or_else(|| TreeTraderError::InsufficientData {
            reason: format!("no data for {}", ticker),
        })
}
