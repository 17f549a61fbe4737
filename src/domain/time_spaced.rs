//! Time-spaced accumulation ladder.
//!
//! Samples the series every `time_step` (nearest observation) and trades one
//! unit per sample in the side's direction, flattening the whole position
//! once its size reaches `loss_position`.

use crate::domain::error::GridfixError;
use crate::domain::grid::Side;
use crate::domain::rebalance::check_prices;
use crate::domain::tick::PricePoint;
use chrono::{Duration, NaiveDateTime};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpacedPoint {
    pub timestamp: NaiveDateTime,
    pub reval: f64,
    pub position: i64,
    pub price: f64,
}

/// Index of the observation closest to `at`; ties go to the earlier one.
fn nearest(points: &[PricePoint], at: NaiveDateTime) -> usize {
    let idx = points.partition_point(|p| p.timestamp < at);
    if idx == 0 {
        return 0;
    }
    if idx == points.len() {
        return points.len() - 1;
    }
    let before = at - points[idx - 1].timestamp;
    let after = points[idx].timestamp - at;
    if after < before { idx } else { idx - 1 }
}

pub fn time_spaced_fix(
    points: &[PricePoint],
    time_step: Duration,
    loss_position: i64,
    side: Side,
) -> Result<Vec<SpacedPoint>, GridfixError> {
    if time_step <= Duration::zero() {
        return Err(GridfixError::ConfigInvalid {
            section: "time_spaced".into(),
            key: "time_step".into(),
            reason: "time_step must be positive".into(),
        });
    }
    if loss_position < 1 {
        return Err(GridfixError::ConfigInvalid {
            section: "time_spaced".into(),
            key: "loss_position".into(),
            reason: "loss_position must be at least 1".into(),
        });
    }
    check_prices(points)?;

    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Ok(Vec::new());
    };

    let buying = side == Side::Long;
    let sign: i64 = if buying { 1 } else { -1 };
    let mut last_px = first.price;
    let mut money = -last_px * sign as f64;
    let mut position = sign;
    let mut history = Vec::new();

    let mut cursor = first.timestamp;
    while cursor <= last.timestamp {
        let px = points[nearest(points, cursor)].price;

        if position.abs() >= loss_position {
            money += position as f64 * px;
            position = 0;
        }

        if (px < last_px && position < 0) || (position >= 0 && buying) {
            money -= px;
            position += 1;
        } else if (px > last_px && position > 0) || (position <= 0 && !buying) {
            money += px;
            position -= 1;
        }
        last_px = px;

        history.push(SpacedPoint {
            timestamp: cursor,
            reval: money + position as f64 * px,
            position,
            price: px,
        });
        cursor += time_step;
    }

    Ok(history)
}
