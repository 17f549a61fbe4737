//! Summary statistics of a grid run.

use super::grid::{FixPoint, GridRun, Termination};

#[derive(Debug, Clone, PartialEq)]
pub struct RunMetrics {
    pub ticks: usize,
    pub final_reval: f64,
    pub final_fix: f64,
    /// Largest peak-to-trough fall of the reval curve, in money.
    pub max_drawdown: f64,
    pub fills: usize,
    pub closes: usize,
    pub liquidations: usize,
    pub max_abs_position: i64,
    pub fee: f64,
    pub termination: Termination,
}

impl RunMetrics {
    pub fn compute(run: &GridRun) -> Self {
        let points = &run.curve.points;
        let last = points.last();

        RunMetrics {
            ticks: points.len(),
            final_reval: last.map(|p| p.reval).unwrap_or(0.0),
            final_fix: last.map(|p| p.fix).unwrap_or(0.0),
            max_drawdown: compute_drawdown(points),
            fills: run.state.fills,
            closes: run.state.closes,
            liquidations: run.state.liquidations,
            max_abs_position: points.iter().map(|p| p.position.abs()).max().unwrap_or(0),
            fee: run.state.fee,
            termination: run.termination,
        }
    }
}

fn compute_drawdown(points: &[FixPoint]) -> f64 {
    let Some(first) = points.first() else {
        return 0.0;
    };

    let mut peak = first.reval;
    let mut max_dd = 0.0_f64;
    for point in points {
        if point.reval > peak {
            peak = point.reval;
        } else {
            max_dd = max_dd.max(peak - point.reval);
        }
    }
    max_dd
}
