//! Vectorized formula evaluation over an aligned frame.

use crate::domain::error::GridfixError;
use crate::domain::formula::{Expr, IndicatorKind};
use crate::domain::moving_average::{ema, sma};
use crate::domain::tick::AlignedFrame;

/// One value per frame row. Rows inside the formula's warmup are NaN.
pub fn evaluate(expr: &Expr, frame: &AlignedFrame) -> Result<Vec<f64>, GridfixError> {
    let len = frame.len();
    match expr {
        Expr::Number(n) => Ok(vec![*n; len]),
        Expr::Symbol(name) => frame
            .column(name)
            .map(<[f64]>::to_vec)
            .ok_or_else(|| GridfixError::UnknownSymbol {
                symbol: name.clone(),
            }),
        Expr::Neg(inner) => Ok(evaluate(inner, frame)?.into_iter().map(|v| -v).collect()),
        Expr::Binary { op, left, right } => {
            let left = evaluate(left, frame)?;
            let right = evaluate(right, frame)?;
            Ok(left
                .iter()
                .zip(&right)
                .map(|(&l, &r)| op.apply(l, r))
                .collect())
        }
        Expr::Indicator { kind, arg, period } => {
            let values = evaluate(arg, frame)?;
            Ok(match kind {
                IndicatorKind::Sma => sma(&values, *period),
                IndicatorKind::Ema => ema(&values, *period),
            })
        }
    }
}
