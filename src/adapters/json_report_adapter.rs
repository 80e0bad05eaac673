//! JSON report adapter implementing ReportPort.
//!
//! Writes the serialised [`BacktestResults`] as pretty-printed JSON. An output
//! path of `-` writes to stdout.

use std::fs;
use std::io::Write;

use crate::domain::backtest::BacktestResults;
use crate::domain::error::TreeTraderError;
use crate::ports::report_port::ReportPort;

pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn render(results: &BacktestResults) -> Result<String, TreeTraderError> {
        Ok(serde_json::to_string_pretty(results)?)
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, results: &BacktestResults, output_path: &str) -> Result<(), TreeTraderError> {
        let json = Self::render(results)?;
        if output_path == "-" {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", json)?;
        } else {
            fs::write(output_path, json + "\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::HistoryPoint;
    use crate::domain::metrics::Metrics;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn sample_results(history: Option<Vec<HistoryPoint>>) -> BacktestResults {
        let date_from = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        BacktestResults {
            date_from,
            date_to: NaiveDate::from_ymd_opt(2024, 6, 28).unwrap(),
            starting_balance: 10_000.0,
            ending_balance: 10_500.0,
            ticker_start_dates: BTreeMap::from([("SPY".to_string(), date_from)]),
            metrics: Metrics {
                cumulative_return: 5.0,
                ..Metrics::default()
            },
            trades: 3,
            history,
        }
    }

    #[test]
    fn history_is_omitted_when_not_requested() {
        let json = JsonReportAdapter::render(&sample_results(None)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value.get("history").is_none());
        assert_eq!(value["date_from"], "2024-01-02");
        assert_eq!(value["metrics"]["cumulative_return"], 5.0);
        assert_eq!(value["ticker_start_dates"]["SPY"], "2024-01-02");
    }

    #[test]
    fn history_is_written_when_present() {
        let point = HistoryPoint {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            tickers: BTreeMap::from([("SPY".to_string(), Some(100.0)), ("TLT".to_string(), None)]),
            value: 10_000.0,
        };
        let json = JsonReportAdapter::render(&sample_results(Some(vec![point]))).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["history"][0]["tickers"]["SPY"], 100.0);
        assert!(value["history"][0]["tickers"]["TLT"].is_null());
    }

    #[test]
    fn writes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        JsonReportAdapter
            .write(&sample_results(None), path.to_str().unwrap())
            .unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"ending_balance\": 10500.0"));
    }
}
