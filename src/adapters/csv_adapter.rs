//! CSV file data adapter.
//!
//! One file per ticker, `{TICKER}.csv`, with a header row. The `date` column
//! (`YYYY-MM-DD`) and the `close` column are read; any other columns such as
//! open/high/low/volume are ignored. Without a `close` header the fifth
//! column is used, matching the usual `date,open,high,low,close,volume` layout.

use crate::domain::bar::DailyClose;
use crate::domain::error::TreeTraderError;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::PathBuf;

const DEFAULT_CLOSE_COLUMN: usize = 4;

#[derive(Debug)]
pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", ticker))
    }

    /// All closes for `ticker` sorted by date, or `None` without a file.
    fn read_closes(&self, ticker: &str) -> Result<Option<Vec<DailyClose>>, TreeTraderError> {
        let path = self.csv_path(ticker);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|e| TreeTraderError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let close_column = rdr
            .headers()
            .map_err(|e| TreeTraderError::Data {
                reason: format!("CSV header error in {}: {}", path.display(), e),
            })?
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case("close"))
            .unwrap_or(DEFAULT_CLOSE_COLUMN);

        let mut closes = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| TreeTraderError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = record.get(0).ok_or_else(|| TreeTraderError::Data {
                reason: "missing date column".into(),
            })?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|e| {
                TreeTraderError::Data {
                    reason: format!("invalid date format: {}", e),
                }
            })?;

            let close: f64 = record
                .get(close_column)
                .ok_or_else(|| TreeTraderError::Data {
                    reason: "missing close column".into(),
                })?
                .trim()
                .parse()
                .map_err(|e| TreeTraderError::Data {
                    reason: format!("invalid close value: {}", e),
                })?;

            closes.push(DailyClose::new(date, close));
        }

        closes.sort_by_key(|c| c.date);
        closes.dedup_by_key(|c| c.date);
        Ok(Some(closes))
    }
}

impl DataPort for CsvAdapter {
    fn fetch_closes(
        &self,
        tickers: &BTreeSet<String>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<HashMap<String, Vec<DailyClose>>, TreeTraderError> {
        let mut out = HashMap::with_capacity(tickers.len());
        for ticker in tickers {
            let closes = self
                .read_closes(ticker)?
                .unwrap_or_default()
                .into_iter()
                .filter(|c| c.date >= from && c.date <= to)
                .collect();
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
        let closes = self
            .read_closes(anchor)?
            .ok_or_else(|| TreeTraderError::Data {
                reason: format!("no data file for calendar ticker {}", anchor),
            })?;
        Ok(closes
            .into_iter()
            .map(|c| c.date)
            .filter(|d| *d >= from && *d <= to)
            .collect())
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, TreeTraderError> {
        let Some(closes) = self.read_closes(ticker)? else {
            return Ok(None);
        };
        Ok(match (closes.first(), closes.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, closes.len())),
            _ => None,
        })
    }

    fn list_symbols(&self) -> Result<Vec<String>, TreeTraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| TreeTraderError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TreeTraderError::Data {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(ticker) = name_str.strip_suffix(".csv") {
                symbols.push(ticker.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
