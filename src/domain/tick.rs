//! Price series representation and alignment.

use crate::domain::error::GridfixError;
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap};

/// One `(timestamp, price)` observation of a series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub timestamp: NaiveDateTime,
    pub price: f64,
}

/// One row of simulator input.
///
/// `trend` is `None` when the run has no trend filter; `entry_allowed` is the
/// entry mask value for this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceTick {
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub trend: Option<f64>,
    pub entry_allowed: bool,
}

impl PriceTick {
    pub fn new(timestamp: NaiveDateTime, price: f64) -> Self {
        PriceTick {
            timestamp,
            price,
            trend: None,
            entry_allowed: true,
        }
    }
}

/// Zip a price series with optional trend and entry mask sequences.
///
/// Omitted trend disables the trend filter; omitted mask allows entry on
/// every tick.
pub fn build_ticks(
    points: &[PricePoint],
    trend: Option<&[f64]>,
    entry_mask: Option<&[bool]>,
) -> Result<Vec<PriceTick>, GridfixError> {
    if let Some(trend) = trend {
        if trend.len() != points.len() {
            return Err(GridfixError::invalid_data(
                trend.len().min(points.len()),
                format!(
                    "trend has {} values but series has {}",
                    trend.len(),
                    points.len()
                ),
            ));
        }
    }
    if let Some(mask) = entry_mask {
        if mask.len() != points.len() {
            return Err(GridfixError::invalid_data(
                mask.len().min(points.len()),
                format!(
                    "entry mask has {} values but series has {}",
                    mask.len(),
                    points.len()
                ),
            ));
        }
    }

    Ok(points
        .iter()
        .enumerate()
        .map(|(i, p)| PriceTick {
            timestamp: p.timestamp,
            price: p.price,
            trend: trend.map(|t| t[i]),
            entry_allowed: entry_mask.map(|m| m[i]).unwrap_or(true),
        })
        .collect())
}

/// Reject non-finite prices and trend values.
pub fn validate_ticks(ticks: &[PriceTick]) -> Result<(), GridfixError> {
    for (i, tick) in ticks.iter().enumerate() {
        if !tick.price.is_finite() {
            return Err(GridfixError::invalid_data(
                i,
                format!("non-finite price {}", tick.price),
            ));
        }
        if let Some(trend) = tick.trend {
            if !trend.is_finite() {
                return Err(GridfixError::invalid_data(
                    i,
                    format!("non-finite trend {}", trend),
                ));
            }
        }
    }
    Ok(())
}

/// Several symbols' prices on their common timestamps.
#[derive(Debug, Clone, Default)]
pub struct AlignedFrame {
    pub timestamps: Vec<NaiveDateTime>,
    pub columns: HashMap<String, Vec<f64>>,
}

impl AlignedFrame {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn column(&self, symbol: &str) -> Option<&[f64]> {
        self.columns.get(symbol).map(Vec::as_slice)
    }

    /// Drop the first `n` rows from every column.
    pub fn skip(&self, n: usize) -> AlignedFrame {
        let n = n.min(self.len());
        AlignedFrame {
            timestamps: self.timestamps[n..].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|(k, v)| (k.clone(), v[n..].to_vec()))
                .collect(),
        }
    }
}

/// Inner-join series on timestamp. The result is ordered by timestamp;
/// duplicate timestamps within one series keep the last observation.
pub fn align_series(series: &BTreeMap<String, Vec<PricePoint>>) -> AlignedFrame {
    if series.is_empty() {
        return AlignedFrame::default();
    }

    let indexed: Vec<(&String, BTreeMap<NaiveDateTime, f64>)> = series
        .iter()
        .map(|(symbol, points)| {
            let by_ts = points.iter().map(|p| (p.timestamp, p.price)).collect();
            (symbol, by_ts)
        })
        .collect();

    let (_, first) = &indexed[0];
    let timestamps: Vec<NaiveDateTime> = first
        .keys()
        .filter(|ts| indexed.iter().all(|(_, m)| m.contains_key(ts)))
        .copied()
        .collect();

    let columns = indexed
        .iter()
        .map(|(symbol, m)| {
            let values = timestamps.iter().filter_map(|ts| m.get(ts).copied()).collect();
            ((*symbol).clone(), values)
        })
        .collect();

    AlignedFrame {
        timestamps,
        columns,
    }
}
