//! Band-crossing counter around a trend.

use crate::domain::error::GridfixError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Crossing {
    /// Dropped back inside after being above `+width`.
    Up,
    /// Fell below `-width`.
    Down,
    /// Fell below the trend itself.
    Zero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrossingCounts {
    pub up: usize,
    pub down: usize,
}

/// Counts alternating band exits of `values - trend`.
///
/// An `up` only counts when the last counted event was not also an `up`
/// (and likewise for `down`); with `reset_on_zero` a drop below the trend
/// forgets the last counted side. Comparisons against NaN are false, so
/// warmup rows never produce events.
pub fn count_crossings(
    values: &[f64],
    trend: &[f64],
    width: f64,
    reset_on_zero: bool,
) -> Result<CrossingCounts, GridfixError> {
    if values.len() != trend.len() {
        return Err(GridfixError::Data {
            reason: format!(
                "trend has {} values but series has {}",
                trend.len(),
                values.len()
            ),
        });
    }

    let detrended: Vec<f64> = values.iter().zip(trend).map(|(v, t)| v - t).collect();

    let mut events = Vec::new();
    for pair in detrended.windows(2) {
        let (prev, cur) = (pair[0], pair[1]);
        if prev > width && !(cur > width) {
            events.push(Crossing::Up);
        }
        if !(prev < -width) && cur < -width {
            events.push(Crossing::Down);
        }
        if !(prev < 0.0) && cur < 0.0 {
            events.push(Crossing::Zero);
        }
    }

    // -1 after an up, 1 after a down, 0 when reset.
    let mut state = 0i8;
    let mut counts = CrossingCounts::default();
    for event in events {
        match event {
            Crossing::Up if state != -1 => {
                state = -1;
                counts.up += 1;
            }
            Crossing::Down if state != 1 => {
                state = 1;
                counts.down += 1;
            }
            Crossing::Zero if reset_on_zero => state = 0,
            _ => {}
        }
    }

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternating_exits_are_counted() {
        let values = [0.0, 3.0, 0.0, -3.0, 0.0, 3.0, 0.0];
        let counts = count_crossings(&values, &[0.0; 7], 2.0, true).unwrap();
        assert_eq!(counts, CrossingCounts { up: 2, down: 1 });
    }

    #[test]
    fn repeated_up_without_reset_counts_once() {
        let values = [0.0, 3.0, 1.0, -1.0, 1.0, 3.0, 1.0];
        let counts = count_crossings(&values, &[0.0; 7], 2.0, false).unwrap();
        assert_eq!(counts, CrossingCounts { up: 1, down: 0 });
    }

    #[test]
    fn zero_crossing_resets_state() {
        let values = [0.0, 3.0, 1.0, -1.0, 1.0, 3.0, 1.0];
        let counts = count_crossings(&values, &[0.0; 7], 2.0, true).unwrap();
        assert_eq!(counts, CrossingCounts { up: 2, down: 0 });
    }

    #[test]
    fn trend_is_subtracted() {
        let values = [10.0, 13.0, 10.0];
        let counts = count_crossings(&values, &[10.0; 3], 2.0, true).unwrap();
        assert_eq!(counts.up, 1);
    }

    #[test]
    fn nan_trend_produces_no_events() {
        let values = [0.0, 5.0, 0.0];
        let counts = count_crossings(&values, &[f64::NAN; 3], 1.0, true).unwrap();
        assert_eq!(counts, CrossingCounts::default());
    }

    #[test]
    fn length_mismatch() {
        assert!(count_crossings(&[1.0, 2.0], &[1.0], 1.0, true).is_err());
    }
}
