#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use gridfix::domain::error::GridfixError;
use gridfix::domain::grid::EquityCurve;
use gridfix::domain::rebalance::EquityPoint;
pub use gridfix::domain::tick::{PricePoint, PriceTick};
use gridfix::ports::data_port::DataPort;
use gridfix::ports::report_port::ReportPort;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub struct MockDataPort {
    pub data: HashMap<String, Vec<PricePoint>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_series(mut self, symbol: &str, points: Vec<PricePoint>) -> Self {
        self.data.insert(symbol.to_string(), points);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_series(
        &self,
        symbol: &str,
        _exchange: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<PricePoint>, GridfixError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(GridfixError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .map(|points| {
                points
                    .iter()
                    .filter(|p| start.is_none_or(|s| p.timestamp.date() >= s))
                    .filter(|p| end.is_none_or(|e| p.timestamp.date() <= e))
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self, _exchange: &str) -> Result<Vec<String>, GridfixError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

/// Records what would have been written instead of touching the disk.
pub struct MockReportPort {
    pub curves: RefCell<Vec<(EquityCurve, PathBuf)>>,
    pub equity: RefCell<Vec<(Vec<EquityPoint>, PathBuf)>>,
}

impl MockReportPort {
    pub fn new() -> Self {
        Self {
            curves: RefCell::new(Vec::new()),
            equity: RefCell::new(Vec::new()),
        }
    }
}

impl ReportPort for MockReportPort {
    fn write_curve(&self, curve: &EquityCurve, output_path: &Path) -> Result<(), GridfixError> {
        self.curves
            .borrow_mut()
            .push((curve.clone(), output_path.to_path_buf()));
        Ok(())
    }

    fn write_equity(
        &self,
        points: &[EquityPoint],
        output_path: &Path,
    ) -> Result<(), GridfixError> {
        self.equity
            .borrow_mut()
            .push((points.to_vec(), output_path.to_path_buf()));
        Ok(())
    }
}

pub fn start_ts() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
}

/// Minute bars starting at 2024-01-02 10:00.
pub fn make_points(prices: &[f64]) -> Vec<PricePoint> {
    prices
        .iter()
        .enumerate()
        .map(|(i, &price)| PricePoint {
            timestamp: start_ts() + Duration::minutes(i as i64),
            price,
        })
        .collect()
}

/// Daily bars starting at 2024-01-02 10:00.
pub fn make_daily_points(prices: &[f64]) -> Vec<PricePoint> {
    prices
        .iter()
        .enumerate()
        .map(|(i, &price)| PricePoint {
            timestamp: start_ts() + Duration::days(i as i64),
            price,
        })
        .collect()
}

pub fn make_ticks(prices: &[f64]) -> Vec<PriceTick> {
    make_points(prices)
        .into_iter()
        .map(|p| PriceTick::new(p.timestamp, p.price))
        .collect()
}
