#![allow(dead_code)]

use chrono::{Datelike, Days, NaiveDate, Weekday};
use std::collections::{BTreeSet, HashMap};
use treetrader::domain::backtest::{BacktestRequest, IncludeOptions};
pub use treetrader::domain::bar::DailyClose;
use treetrader::domain::error::TreeTraderError;
use treetrader::domain::node::TradingBotNode;
use treetrader::ports::data_port::DataPort;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<DailyClose>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_closes(mut self, ticker: &str, closes: Vec<DailyClose>) -> Self {
        self.data.insert(ticker.to_string(), closes);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }

    fn check(&self, ticker: &str) -> Result<(), TreeTraderError> {
        match self.errors.get(ticker) {
            Some(reason) => Err(TreeTraderError::Data {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl DataPort for MockDataPort {
    fn fetch_closes(
        &self,
        tickers: &BTreeSet<String>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<HashMap<String, Vec<DailyClose>>, TreeTraderError> {
        let mut out = HashMap::new();
        for ticker in tickers {
            self.check(ticker)?;
            let closes = self
                .data
                .get(ticker)
                .map(|c| {
                    c.iter()
                        .filter(|c| c.date >= from && c.date <= to)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            out.insert(ticker.clone(), closes);
        }
        Ok(out)
    }

    fn trading_dates(
        &self,
        anchor: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NaiveDate>, TreeTraderError> {
        self.check(anchor)?;
        let closes = self.data.get(anchor).ok_or_else(|| TreeTraderError::Data {
            reason: format!("no data for {}", anchor),
        })?;
        Ok(closes
            .iter()
            .map(|c| c.date)
            .filter(|d| *d >= from && *d <= to)
            .collect())
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, TreeTraderError> {
        self.check(ticker)?;
        match self.data.get(ticker) {
            Some(closes) if !closes.is_empty() => {
                let min = closes.iter().map(|c| c.date).min().unwrap();
                let max = closes.iter().map(|c| c.date).max().unwrap();
                Ok(Some((min, max, closes.len())))
            }
            _ => Ok(None),
        }
    }

    fn list_symbols(&self) -> Result<Vec<String>, TreeTraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// `count` consecutive weekdays from `start`.
pub fn weekdays(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(count);
    let mut current = start;
    while dates.len() < count {
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            dates.push(current);
        }
        current = current + Days::new(1);
    }
    dates
}

/// Weekday closes from `start` with prices produced by `price(i)`.
pub fn generate_closes(start: NaiveDate, count: usize, price: impl Fn(usize) -> f64) -> Vec<DailyClose> {
    weekdays(start, count)
        .into_iter()
        .enumerate()
        .map(|(i, d)| DailyClose::new(d, price(i)))
        .collect()
}

/// SPY rising by one dollar a day from 100, TLT flat at 100, 40 weekdays
/// from Monday 2024-01-01 through Friday 2024-02-23.
pub fn spy_tlt_port() -> MockDataPort {
    MockDataPort::new()
        .with_closes("SPY", generate_closes(date(2024, 1, 1), 40, |i| 100.0 + i as f64))
        .with_closes("TLT", generate_closes(date(2024, 1, 1), 40, |_| 100.0))
}

pub fn tree(json: &str) -> TradingBotNode {
    serde_json::from_str(json).unwrap()
}

pub fn request(tree: TradingBotNode, start: NaiveDate, end: NaiveDate) -> BacktestRequest {
    BacktestRequest {
        starting_balance: 10_000,
        start_date: start,
        end_date: end,
        trading_bot: tree,
        include: IncludeOptions::default(),
    }
}

pub fn far_future() -> NaiveDate {
    date(2030, 1, 1)
}
