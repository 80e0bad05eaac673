//! Daily close representation.

use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyClose {
    pub date: NaiveDate,
    pub close: f64,
}

impl DailyClose {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}
