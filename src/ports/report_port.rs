//! Report generation port trait.

use crate::domain::backtest::BacktestResults;
use crate::domain::error::TreeTraderError;

/// Port for writing backtest reports.
pub trait ReportPort {
    fn write(&self, results: &BacktestResults, output_path: &str) -> Result<(), TreeTraderError>;
}
