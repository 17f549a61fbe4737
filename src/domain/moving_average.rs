//! Moving averages over plain `f64` series.
//!
//! Leading NaN values are treated as warmup from an upstream calculation; the
//! average starts at the first non-NaN value and the output carries NaN for
//! every bar that has no valid value yet.

fn first_valid(values: &[f64]) -> Option<usize> {
    values.iter().position(|v| !v.is_nan())
}

/// Simple moving average. The first `period - 1` valid bars are warmup.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    let Some(start) = first_valid(values) else {
        return out;
    };
    if period == 0 {
        return out;
    }

    let mut sum = 0.0;
    for i in start..values.len() {
        sum += values[i];
        if i >= start + period {
            sum -= values[i - period];
        }
        if i + 1 >= start + period {
            out[i] = sum / period as f64;
        }
    }
    out
}

/// Exponential moving average, k = 2/(n+1), seeded with the SMA of the
/// first `period` valid bars.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    let Some(start) = first_valid(values) else {
        return out;
    };
    if period == 0 {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut sum = 0.0;
    let mut ema = 0.0;
    for i in start..values.len() {
        let n = i - start;
        if n + 1 < period {
            sum += values[i];
        } else if n + 1 == period {
            sum += values[i];
            ema = sum / period as f64;
            out[i] = ema;
        } else {
            ema = values[i] * k + ema * (1.0 - k);
            out[i] = ema;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_warmup_and_values() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert!((out[2] - 2.0).abs() < f64::EPSILON);
        assert!((out[3] - 3.0).abs() < f64::EPSILON);
        assert!((out[4] - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sma_period_one_is_identity() {
        let out = sma(&[4.0, 5.0], 1);
        assert_eq!(out, vec![4.0, 5.0]);
    }

    #[test]
    fn sma_skips_upstream_warmup() {
        let out = sma(&[f64::NAN, f64::NAN, 2.0, 4.0, 6.0], 2);
        assert!(out[2].is_nan());
        assert!((out[3] - 3.0).abs() < f64::EPSILON);
        assert!((out[4] - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_seeded_with_sma() {
        let out = ema(&[10.0, 20.0, 30.0, 40.0, 50.0], 3);
        assert!(out[1].is_nan());
        assert!((out[2] - 20.0).abs() < f64::EPSILON);
        // k = 0.5
        assert!((out[3] - 30.0).abs() < f64::EPSILON);
        assert!((out[4] - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn short_series_stays_nan() {
        assert!(ema(&[1.0, 2.0], 5).iter().all(|v| v.is_nan()));
        assert!(sma(&[], 3).is_empty());
    }

    #[test]
    fn zero_period_is_all_nan() {
        assert!(sma(&[1.0, 2.0], 0).iter().all(|v| v.is_nan()));
    }
}
