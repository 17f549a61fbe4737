//! Single-unit take-profit / stop-loss walk.

use crate::domain::error::GridfixError;
use crate::domain::tick::{validate_ticks, PriceTick};
use chrono::NaiveDateTime;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatArbPoint {
    pub timestamp: NaiveDateTime,
    pub reval: f64,
    pub take_profits: usize,
    pub stop_losses: usize,
}

/// Buy one unit whenever flat and entry is allowed; exit above
/// `entry + take_profit` or below `entry - stop_loss`.
pub fn stat_arb(
    ticks: &[PriceTick],
    take_profit: f64,
    stop_loss: f64,
) -> Result<Vec<StatArbPoint>, GridfixError> {
    for (key, value) in [("take_profit", take_profit), ("stop_loss", stop_loss)] {
        if !value.is_finite() || value < 0.0 {
            return Err(GridfixError::ConfigInvalid {
                section: "stat_arb".into(),
                key: key.into(),
                reason: format!("{} must be a non-negative number", key),
            });
        }
    }
    validate_ticks(ticks)?;

    let mut exits: Option<(f64, f64)> = None;
    let mut open_money = 0.0;
    let mut position = 0.0;
    let mut take_profits = 0;
    let mut stop_losses = 0;
    let mut history = Vec::with_capacity(ticks.len());

    for tick in ticks {
        let px = tick.price;
        match exits {
            None => {
                if tick.entry_allowed {
                    exits = Some((px + take_profit, px - stop_loss));
                    open_money -= px;
                    position = 1.0;
                }
            }
            Some((take, stop)) => {
                let closed = if px > take {
                    take_profits += 1;
                    true
                } else if px < stop {
                    stop_losses += 1;
                    true
                } else {
                    false
                };
                if closed {
                    exits = None;
                    open_money += px;
                    position = 0.0;
                }
            }
        }

        history.push(StatArbPoint {
            timestamp: tick.timestamp,
            reval: open_money + position * px,
            take_profits,
            stop_losses,
        });
    }

    Ok(history)
}
