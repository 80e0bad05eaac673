//! Market data access port trait.

use crate::domain::bar::DailyClose;
use crate::domain::error::TreeTraderError;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

pub trait DataPort {
    /// Daily closes for each ticker within `[from, to]`, ascending by date.
    /// Tickers with no data map to an empty vector.
    fn fetch_closes(
        &self,
        tickers: &BTreeSet<String>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<HashMap<String, Vec<DailyClose>>, TreeTraderError>;

    /// The trading calendar of `anchor` within `[from, to]`.
    fn trading_dates(
        &self,
        anchor: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NaiveDate>, TreeTraderError>;

    /// First date, last date and bar count for `ticker`.
    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, TreeTraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, TreeTraderError>;
}
