//! Worst-case loss of a grid before its stop is hit.

use crate::domain::error::GridfixError;

/// `(work_range / 2 + stop_range) * levels * qty_per_level`, where `levels`
/// is `work_range / step` rounded half-to-even.
pub fn grid_risk(
    work_range: f64,
    step: f64,
    stop_range: f64,
    qty_per_level: f64,
) -> Result<f64, GridfixError> {
    let invalid = |key: &str, reason: &str| GridfixError::ConfigInvalid {
        section: "risk".into(),
        key: key.into(),
        reason: reason.into(),
    };

    if !step.is_finite() || step <= 0.0 {
        return Err(invalid("step", "step must be positive"));
    }
    if !work_range.is_finite() || work_range < 0.0 {
        return Err(invalid("work_range", "work_range must be non-negative"));
    }
    if !stop_range.is_finite() || stop_range < 0.0 {
        return Err(invalid("stop_range", "stop_range must be non-negative"));
    }
    if !qty_per_level.is_finite() {
        return Err(invalid("qty_per_level", "qty_per_level must be finite"));
    }

    let levels = (work_range / step).round_ties_even();
    Ok((work_range / 2.0 + stop_range) * levels * qty_per_level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_basic() {
        // 10 levels, each at risk of half the range plus the stop.
        let risk = grid_risk(100.0, 10.0, 20.0, 1.0).unwrap();
        assert!((risk - 700.0).abs() < f64::EPSILON);
    }

    #[test]
    fn risk_scales_with_quantity() {
        let risk = grid_risk(100.0, 10.0, 20.0, 3.0).unwrap();
        assert!((risk - 2100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn levels_round_half_to_even() {
        // 25 / 10 = 2.5 -> 2 levels
        let risk = grid_risk(25.0, 10.0, 0.0, 1.0).unwrap();
        assert!((risk - 25.0).abs() < f64::EPSILON);
        // 35 / 10 = 3.5 -> 4 levels
        let risk = grid_risk(35.0, 10.0, 0.0, 1.0).unwrap();
        assert!((risk - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_step_rejected() {
        assert!(matches!(
            grid_risk(100.0, 0.0, 20.0, 1.0),
            Err(GridfixError::ConfigInvalid { .. })
        ));
    }
}
