//! Constant-notional rebalancing walk.
//!
//! Holds `amount` of money in the instrument, resetting the quantity back to
//! `amount / price` whenever more than `rebalance_days` have passed since the
//! last reset.

use crate::domain::error::GridfixError;
use crate::domain::tick::PricePoint;
use chrono::{Duration, NaiveDateTime};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

pub(crate) fn check_prices(points: &[PricePoint]) -> Result<(), GridfixError> {
    for (i, p) in points.iter().enumerate() {
        if !p.price.is_finite() || p.price == 0.0 {
            return Err(GridfixError::invalid_data(
                i,
                format!("price must be finite and non-zero, got {}", p.price),
            ));
        }
    }
    Ok(())
}

pub(crate) fn check_amount(section: &str, amount: f64) -> Result<(), GridfixError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(GridfixError::ConfigInvalid {
            section: section.to_string(),
            key: "amount".to_string(),
            reason: "amount must be positive".to_string(),
        });
    }
    Ok(())
}

/// Equity of a constant-notional position, starting at `amount`.
pub fn rebalance_amount(
    points: &[PricePoint],
    amount: f64,
    rebalance_days: i64,
) -> Result<Vec<EquityPoint>, GridfixError> {
    check_amount("rebalance", amount)?;
    if rebalance_days < 0 {
        return Err(GridfixError::ConfigInvalid {
            section: "rebalance".to_string(),
            key: "rebalance_days".to_string(),
            reason: "rebalance_days must be non-negative".to_string(),
        });
    }
    check_prices(points)?;

    let Some(first) = points.first() else {
        return Ok(Vec::new());
    };

    let period = Duration::days(rebalance_days);
    let mut qty = amount / first.price;
    let mut open_money = -amount;
    let mut last_rebalance = first.timestamp;
    let mut curve = Vec::with_capacity(points.len());

    for point in points {
        if point.timestamp > last_rebalance + period {
            open_money += qty * point.price;
            qty = amount / point.price;
            open_money -= qty * point.price;
            last_rebalance = point.timestamp;
            tracing::debug!(timestamp = %point.timestamp, qty, "rebalanced");
        }
        curve.push(EquityPoint {
            timestamp: point.timestamp,
            equity: open_money + qty * point.price + amount,
        });
    }

    Ok(curve)
}
