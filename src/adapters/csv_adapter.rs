//! CSV file data adapter.
//!
//! One file per instrument, `{SYMBOL}_{EXCHANGE}.csv`, with a header row.
//! The first column is the timestamp; the price is taken from a `price` or
//! `close` column, falling back to the second column.

use crate::domain::error::GridfixError;
use crate::domain::tick::PricePoint;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::path::PathBuf;

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, exchange: &str) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, exchange))
    }
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn price_column(headers: &csv::StringRecord) -> usize {
    headers
        .iter()
        .position(|h| {
            let h = h.trim();
            h.eq_ignore_ascii_case("price") || h.eq_ignore_ascii_case("close")
        })
        .unwrap_or(1)
}

impl DataPort for CsvAdapter {
    fn fetch_series(
        &self,
        symbol: &str,
        exchange: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<PricePoint>, GridfixError> {
        let path = self.csv_path(symbol, exchange);
        let content = fs::read_to_string(&path).map_err(|e| GridfixError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let column = price_column(rdr.headers().map_err(|e| GridfixError::Data {
            reason: format!("CSV header error in {}: {}", path.display(), e),
        })?);

        let mut points = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| GridfixError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;

            let ts_str = record.get(0).ok_or_else(|| GridfixError::Data {
                reason: "missing timestamp column".into(),
            })?;
            let timestamp = parse_timestamp(ts_str).ok_or_else(|| GridfixError::Data {
                reason: format!("invalid timestamp '{}' on row {}", ts_str, line + 1),
            })?;

            let date = timestamp.date();
            if start.is_some_and(|s| date < s) || end.is_some_and(|e| date > e) {
                continue;
            }

            let price: f64 = record
                .get(column)
                .ok_or_else(|| GridfixError::Data {
                    reason: format!("missing price column on row {}", line + 1),
                })?
                .trim()
                .parse()
                .map_err(|e| GridfixError::Data {
                    reason: format!("invalid price value on row {}: {}", line + 1, e),
                })?;

            points.push(PricePoint { timestamp, price });
        }

        points.sort_by_key(|p| p.timestamp);
        tracing::debug!(symbol, exchange, rows = points.len(), "loaded series");
        Ok(points)
    }

    fn list_symbols(&self, exchange: &str) -> Result<Vec<String>, GridfixError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| GridfixError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let suffix = format!("_{}.csv", exchange);
        let mut symbols = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| GridfixError::Data {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(symbol) = name_str.strip_suffix(&suffix) {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "time,open,high,low,close,volume\n\
            2024-01-15 10:00:00,100.0,110.0,90.0,105.0,50000\n\
            2024-01-16 10:00:00,105.0,115.0,100.0,110.0,60000\n\
            2024-01-17 10:00:00,110.0,120.0,105.0,115.0,55000\n";

        fs::write(path.join("BHP_ASX.csv"), csv_content).unwrap();
        fs::write(
            path.join("SPREAD_CME.csv"),
            "time,price\n2024-01-16,2.5\n2024-01-15,1.5\n",
        )
        .unwrap();
        fs::write(path.join("CBA_ASX.csv"), "time,price\n").unwrap();

        (dir, path)
    }

    #[test]
    fn fetch_series_uses_close_column() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let points = adapter.fetch_series("BHP", "ASX", None, None).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].price, 105.0);
        assert_eq!(
            points[0].timestamp,
            NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn fetch_series_sorts_and_reads_price_column() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let points = adapter.fetch_series("SPREAD", "CME", None, None).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].price, 1.5);
        assert_eq!(points[1].price, 2.5);
    }

    #[test]
    fn fetch_series_filters_date_range() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let start = NaiveDate::from_ymd_opt(2024, 1, 16);
        let end = NaiveDate::from_ymd_opt(2024, 1, 16);
        let points = adapter.fetch_series("BHP", "ASX", start, end).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].price, 110.0);
    }

    #[test]
    fn fetch_series_missing_file() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let result = adapter.fetch_series("XYZ", "ASX", None, None);
        assert!(matches!(result, Err(GridfixError::Data { .. })));
    }

    #[test]
    fn fetch_series_bad_price() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("X_Y.csv"), "time,price\n2024-01-01,abc\n").unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        assert!(adapter.fetch_series("X", "Y", None, None).is_err());
    }

    #[test]
    fn list_symbols_filters_by_exchange() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        assert_eq!(
            adapter.list_symbols("ASX").unwrap(),
            vec!["BHP".to_string(), "CBA".to_string()]
        );
        assert_eq!(adapter.list_symbols("CME").unwrap(), vec!["SPREAD".to_string()]);
        assert!(adapter.list_symbols("LSE").unwrap().is_empty());
    }

    #[test]
    fn data_range_from_default_method() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let (first, last, count) = adapter.get_data_range("BHP", "ASX").unwrap().unwrap();
        assert_eq!(count, 3);
        assert!(first < last);
        assert!(adapter.get_data_range("CBA", "ASX").unwrap().is_none());
    }

    #[test]
    fn timestamp_formats() {
        assert!(parse_timestamp("2024-01-02T09:30:00").is_some());
        assert!(parse_timestamp("2024-01-02 09:30").is_some());
        assert!(parse_timestamp("2024-01-02").is_some());
        assert!(parse_timestamp("02/01/2024").is_none());
    }
}
