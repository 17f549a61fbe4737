//! Price data access port.

use crate::domain::error::GridfixError;
use crate::domain::tick::PricePoint;
use chrono::{NaiveDate, NaiveDateTime};

/// Source of ordered price series keyed by `(symbol, exchange)`.
pub trait DataPort {
    /// Observations within `[start, end]` (dates inclusive), ordered by
    /// timestamp. Open bounds are unrestricted.
    fn fetch_series(
        &self,
        symbol: &str,
        exchange: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<PricePoint>, GridfixError>;

    fn list_symbols(&self, exchange: &str) -> Result<Vec<String>, GridfixError>;

    /// First and last timestamp plus observation count, `None` when the
    /// series is empty.
    fn get_data_range(
        &self,
        symbol: &str,
        exchange: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, GridfixError> {
        let series = self.fetch_series(symbol, exchange, None, None)?;
        Ok(match (series.first(), series.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp, series.len())),
            _ => None,
        })
    }
}
