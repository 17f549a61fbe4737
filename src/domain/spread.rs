//! Building simulator input from stored series.
//!
//! Loads every symbol a formula (and optional trend formula) references,
//! inner-joins them on timestamp, evaluates both expressions and drops the
//! leading rows that are still inside an indicator warmup.

use crate::domain::error::GridfixError;
use crate::domain::formula::Expr;
use crate::domain::formula_eval::evaluate;
use crate::domain::tick::{
    align_series, build_ticks, validate_ticks, AlignedFrame, PricePoint, PriceTick,
};
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Where and over which dates series are read.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesWindow {
    pub exchange: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// Fetch and align the given symbols. A symbol with no rows in the window
/// is an error.
pub fn load_frame(
    data_port: &dyn DataPort,
    symbols: &[String],
    window: &SeriesWindow,
) -> Result<AlignedFrame, GridfixError> {
    let mut series = BTreeMap::new();
    for symbol in symbols {
        let points = data_port.fetch_series(symbol, &window.exchange, window.start, window.end)?;
        if points.is_empty() {
            return Err(GridfixError::NoData {
                symbol: symbol.clone(),
                exchange: window.exchange.clone(),
            });
        }
        tracing::debug!(symbol = %symbol, rows = points.len(), "fetched series");
        series.insert(symbol.clone(), points);
    }

    let frame = align_series(&series);
    if symbols.len() > 1 && frame.is_empty() {
        return Err(GridfixError::Data {
            reason: format!("series for {} share no timestamps", symbols.join(", ")),
        });
    }
    Ok(frame)
}

/// Evaluated price and trend rows, warmup removed.
#[derive(Debug, Clone, PartialEq)]
pub struct SpreadSeries {
    pub points: Vec<PricePoint>,
    pub trend: Option<Vec<f64>>,
}

impl SpreadSeries {
    pub fn to_ticks(&self) -> Result<Vec<PriceTick>, GridfixError> {
        let ticks = build_ticks(&self.points, self.trend.as_deref(), None)?;
        validate_ticks(&ticks)?;
        Ok(ticks)
    }
}

pub fn evaluate_spread(
    frame: &AlignedFrame,
    formula: &Expr,
    trend: Option<&Expr>,
) -> Result<SpreadSeries, GridfixError> {
    let warmup = formula
        .warmup()
        .max(trend.map(Expr::warmup).unwrap_or(0));

    let prices = evaluate(formula, frame)?;
    let trend_values = trend.map(|t| evaluate(t, frame)).transpose()?;

    let start = warmup.min(frame.len());
    let points = frame.timestamps[start..]
        .iter()
        .zip(&prices[start..])
        .map(|(&timestamp, &price)| PricePoint { timestamp, price })
        .collect();

    Ok(SpreadSeries {
        points,
        trend: trend_values.map(|v| v[start..].to_vec()),
    })
}

/// Load, align and evaluate in one go.
pub fn build_spread(
    data_port: &dyn DataPort,
    formula: &Expr,
    trend: Option<&Expr>,
    window: &SeriesWindow,
) -> Result<SpreadSeries, GridfixError> {
    let mut symbols = formula.symbols();
    if let Some(t) = trend {
        symbols.extend(t.symbols());
        symbols.sort();
        symbols.dedup();
    }

    let frame = load_frame(data_port, &symbols, window)?;
    let series = evaluate_spread(&frame, formula, trend)?;
    tracing::info!(
        rows = series.points.len(),
        warmup = frame.len() - series.points.len(),
        "spread evaluated"
    );
    Ok(series)
}
