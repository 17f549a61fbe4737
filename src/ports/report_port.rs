//! Run output port.

use crate::domain::error::GridfixError;
use crate::domain::grid::EquityCurve;
use crate::domain::rebalance::EquityPoint;
use std::path::Path;

/// Port for persisting simulator output.
pub trait ReportPort {
    fn write_curve(&self, curve: &EquityCurve, output_path: &Path) -> Result<(), GridfixError>;

    fn write_equity(&self, points: &[EquityPoint], output_path: &Path)
        -> Result<(), GridfixError>;
}
