//! CSV report adapter: one row per recorded tick.

use crate::domain::error::GridfixError;
use crate::domain::grid::EquityCurve;
use crate::domain::rebalance::EquityPoint;
use crate::ports::report_port::ReportPort;
use std::path::Path;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct CsvReportAdapter;

fn csv_error(path: &Path, e: csv::Error) -> GridfixError {
    GridfixError::Data {
        reason: format!("failed to write {}: {}", path.display(), e),
    }
}

impl ReportPort for CsvReportAdapter {
    fn write_curve(&self, curve: &EquityCurve, output_path: &Path) -> Result<(), GridfixError> {
        let mut wtr = csv::Writer::from_path(output_path).map_err(|e| csv_error(output_path, e))?;
        wtr.write_record(["timestamp", "reval", "fix", "pos", "closes"])
            .map_err(|e| csv_error(output_path, e))?;

        for point in &curve.points {
            wtr.write_record([
                point.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                point.reval.to_string(),
                point.fix.to_string(),
                point.position.to_string(),
                point.closes.to_string(),
            ])
            .map_err(|e| csv_error(output_path, e))?;
        }

        wtr.flush()?;
        Ok(())
    }

    fn write_equity(
        &self,
        points: &[EquityPoint],
        output_path: &Path,
    ) -> Result<(), GridfixError> {
        let mut wtr = csv::Writer::from_path(output_path).map_err(|e| csv_error(output_path, e))?;
        wtr.write_record(["timestamp", "equity"])
            .map_err(|e| csv_error(output_path, e))?;

        for point in points {
            wtr.write_record([
                point.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                point.equity.to_string(),
            ])
            .map_err(|e| csv_error(output_path, e))?;
        }

        wtr.flush()?;
        Ok(())
    }
}
