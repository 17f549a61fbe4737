//! Rollover walk across consecutive contract series.
//!
//! Holds a constant notional in one contract at a time. The first contract
//! is only traded during its final `enter` window; every contract is closed
//! `exit` before its last observation and the next one is entered from the
//! timestamp where the previous was left.

use crate::domain::error::GridfixError;
use crate::domain::rebalance::{check_amount, check_prices, EquityPoint};
use crate::domain::tick::PricePoint;
use chrono::Duration;

pub fn rollover(
    contracts: &[Vec<PricePoint>],
    amount: f64,
    enter: Duration,
    exit: Duration,
) -> Result<Vec<EquityPoint>, GridfixError> {
    check_amount("rollover", amount)?;
    for contract in contracts {
        check_prices(contract)?;
    }

    let contracts: Vec<&[PricePoint]> = contracts
        .iter()
        .filter(|c| !c.is_empty())
        .map(Vec::as_slice)
        .collect();

    let mut open_money = 0.0;
    let mut qty = 0.0;
    let mut last_timestamp = None;
    let mut curve = Vec::new();

    for (i, contract) in contracts.iter().enumerate() {
        let mut window: Vec<&PricePoint> = contract.iter().collect();

        if i == 0 {
            if let Some(last) = contract.last() {
                let start = last.timestamp - enter;
                window.retain(|p| p.timestamp >= start);
            }
        }
        if let Some(resume) = last_timestamp {
            window.retain(|p| p.timestamp >= resume);
        }
        let Some(last) = window.last() else {
            continue;
        };
        let rollover_at = last.timestamp - exit;

        for point in window {
            last_timestamp = Some(point.timestamp);

            if qty == 0.0 {
                qty = amount / point.price;
                open_money -= amount;
            }

            if point.timestamp >= rollover_at {
                open_money += qty * point.price;
                qty = 0.0;
                tracing::debug!(contract = i, timestamp = %point.timestamp, "rolled over");
                break;
            }

            curve.push(EquityPoint {
                timestamp: point.timestamp,
                equity: open_money + qty * point.price,
            });
        }
    }

    Ok(curve)
}
