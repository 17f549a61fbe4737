//! Configuration validation.
//!
//! Reads every key a run needs through [`ConfigPort`] and rejects bad values
//! before any data is loaded.

use crate::domain::error::GridfixError;
use crate::domain::formula::Expr;
use crate::domain::formula_parser;
use crate::domain::grid::{GridConfig, Side, StepSpec};
use crate::domain::step_schema::StepSchema;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::str::FromStr;

pub const DEFAULT_REBALANCE_AMOUNT: f64 = 100_000.0;
pub const DEFAULT_REBALANCE_DAYS: i64 = 90;

/// Parse an optional key strictly: present but malformed is an error.
pub fn parse_key<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    expected: &str,
) -> Result<Option<T>, GridfixError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<T>()
        .map(Some)
        .map_err(|_| GridfixError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("expected {}, found '{}'", expected, raw),
        })
}

fn parse_date(config: &dyn ConfigPort, key: &str) -> Result<Option<NaiveDate>, GridfixError> {
    match config.get_string("data", key) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| GridfixError::ConfigInvalid {
                section: "data".to_string(),
                key: key.to_string(),
                reason: format!("invalid {} format, expected YYYY-MM-DD", key),
            }),
    }
}

/// `[data] start_date` and `end_date`, both optional.
pub fn data_window(
    config: &dyn ConfigPort,
) -> Result<(Option<NaiveDate>, Option<NaiveDate>), GridfixError> {
    let start = parse_date(config, "start_date")?;
    let end = parse_date(config, "end_date")?;
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(GridfixError::ConfigInvalid {
                section: "data".to_string(),
                key: "start_date".to_string(),
                reason: "start_date must not be after end_date".to_string(),
            });
        }
    }
    Ok((start, end))
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), GridfixError> {
    for key in ["path", "exchange"] {
        if !config.has("data", key) {
            return Err(GridfixError::ConfigMissing {
                section: "data".to_string(),
                key: key.to_string(),
            });
        }
    }
    data_window(config)?;
    Ok(())
}

/// The series formula: `[grid] formula`, falling back to `[grid] symbol`.
pub fn grid_formula(config: &dyn ConfigPort) -> Result<Expr, GridfixError> {
    let source = config
        .get_string("grid", "formula")
        .filter(|s| !s.trim().is_empty())
        .or_else(|| config.get_string("grid", "symbol"))
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| GridfixError::ConfigMissing {
            section: "grid".to_string(),
            key: "formula".to_string(),
        })?;
    Ok(formula_parser::parse(&source)?)
}

pub fn grid_trend(config: &dyn ConfigPort) -> Result<Option<Expr>, GridfixError> {
    match config.get_string("grid", "trend") {
        Some(s) if !s.trim().is_empty() => Ok(Some(formula_parser::parse(&s)?)),
        _ => Ok(None),
    }
}

fn step_spec(config: &dyn ConfigPort) -> Result<StepSpec, GridfixError> {
    if let Some(steps) = config.get_string("grid", "steps").filter(|s| !s.trim().is_empty()) {
        if config.has("grid", "step") {
            return Err(GridfixError::ConfigInvalid {
                section: "grid".to_string(),
                key: "steps".to_string(),
                reason: "set either step or steps, not both".to_string(),
            });
        }
        return Ok(StepSpec::Sparse(StepSchema::parse_sparse(&steps)?));
    }

    let step: f64 = parse_key(config, "grid", "step", "a number")?.ok_or_else(|| {
        GridfixError::ConfigMissing {
            section: "grid".to_string(),
            key: "step".to_string(),
        }
    })?;
    if !step.is_finite() || step <= 0.0 {
        return Err(GridfixError::ConfigInvalid {
            section: "grid".to_string(),
            key: "step".to_string(),
            reason: "step must be positive".to_string(),
        });
    }
    Ok(StepSpec::Scalar(step))
}

/// Build the simulator parameters from `[grid]`.
pub fn grid_config_from(config: &dyn ConfigPort) -> Result<GridConfig, GridfixError> {
    let side = match config.get_string("grid", "side") {
        None => Side::Long,
        Some(s) => s.parse::<Side>().map_err(|reason| GridfixError::ConfigInvalid {
            section: "grid".to_string(),
            key: "side".to_string(),
            reason,
        })?,
    };

    Ok(GridConfig {
        steps: step_spec(config)?,
        side,
        reverse: config.get_bool("grid", "reverse")?.unwrap_or(false),
        width: parse_key(config, "grid", "width", "a number")?.unwrap_or(0.0),
        stop_loss_depth: parse_key(config, "grid", "stop_loss_depth", "a non-negative integer")?,
        book_spread: parse_key(config, "grid", "book_spread", "a number")?.unwrap_or(0.0),
        fee_per_side: parse_key(config, "grid", "fee_per_side", "a number")?.unwrap_or(0.0),
        early_exit: config.get_bool("grid", "early_exit")?.unwrap_or(false),
        initial_position: parse_key(config, "grid", "initial_position", "a non-negative integer")?
            .unwrap_or(0),
        exit_on_stop_loss: config.get_bool("grid", "exit_on_stop_loss")?.unwrap_or(false),
        max_position: parse_key(config, "grid", "max_position", "a non-negative integer")?,
    })
}

/// Validate `[grid]`: formulas parse, parameters are in range and the step
/// schema expands.
pub fn validate_grid_config(config: &dyn ConfigPort) -> Result<(), GridfixError> {
    grid_formula(config)?;
    grid_trend(config)?;
    grid_config_from(config)?.resolve_schema()?;
    Ok(())
}

/// `[rebalance] amount` and `rebalance_days`.
pub fn rebalance_params(config: &dyn ConfigPort) -> Result<(f64, i64), GridfixError> {
    let amount: f64 =
        parse_key(config, "rebalance", "amount", "a number")?.unwrap_or(DEFAULT_REBALANCE_AMOUNT);
    if !amount.is_finite() || amount <= 0.0 {
        return Err(GridfixError::ConfigInvalid {
            section: "rebalance".to_string(),
            key: "amount".to_string(),
            reason: "amount must be positive".to_string(),
        });
    }
    let days: i64 = parse_key(config, "rebalance", "rebalance_days", "an integer")?
        .unwrap_or(DEFAULT_REBALANCE_DAYS);
    if days < 0 {
        return Err(GridfixError::ConfigInvalid {
            section: "rebalance".to_string(),
            key: "rebalance_days".to_string(),
            reason: "rebalance_days must be non-negative".to_string(),
        });
    }
    Ok((amount, days))
}

pub fn validate_rebalance_config(config: &dyn ConfigPort) -> Result<(), GridfixError> {
    grid_formula(config)?;
    rebalance_params(config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapConfig(HashMap<(String, String), String>);

    impl MapConfig {
        fn new(entries: &[(&str, &str, &str)]) -> Self {
            MapConfig(
                entries
                    .iter()
                    .map(|(s, k, v)| ((s.to_string(), k.to_string()), v.to_string()))
                    .collect(),
            )
        }
    }

    impl ConfigPort for MapConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.0.get(&(section.to_string(), key.to_string())).cloned()
        }
    }

    fn base() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("data", "path", "./data"),
            ("data", "exchange", "CME"),
            ("grid", "formula", "ES - 2 * NQ"),
            ("grid", "step", "10"),
        ]
    }

    fn with(extra: &[(&'static str, &'static str, &'static str)]) -> MapConfig {
        let mut entries = base();
        entries.extend_from_slice(extra);
        MapConfig::new(&entries)
    }

    #[test]
    fn valid_minimal_config() {
        let config = with(&[]);
        assert!(validate_data_config(&config).is_ok());
        assert!(validate_grid_config(&config).is_ok());
        let grid = grid_config_from(&config).unwrap();
        assert_eq!(grid.steps, StepSpec::Scalar(10.0));
        assert_eq!(grid.side, Side::Long);
        assert_eq!(grid.max_position, None);
    }

    #[test]
    fn full_grid_section() {
        let config = with(&[
            ("grid", "side", "short"),
            ("grid", "reverse", "true"),
            ("grid", "width", "1.5"),
            ("grid", "stop_loss_depth", "5"),
            ("grid", "max_position", "6"),
            ("grid", "fee_per_side", "0.25"),
            ("grid", "initial_position", "2"),
        ]);
        let grid = grid_config_from(&config).unwrap();
        assert_eq!(grid.side, Side::Short);
        assert!(grid.reverse);
        assert_eq!(grid.stop_loss_depth, Some(5));
        assert_eq!(grid.max_position, Some(6));
        assert_eq!(grid.initial_position, 2);
        assert!((grid.fee_per_side - 0.25).abs() < f64::EPSILON);
        assert!(validate_grid_config(&config).is_ok());
    }

    #[test]
    fn sparse_steps() {
        let config = MapConfig::new(&[
            ("grid", "symbol", "ES"),
            ("grid", "steps", "0:10, 3:15, 6:none"),
        ]);
        let grid = grid_config_from(&config).unwrap();
        assert!(matches!(grid.steps, StepSpec::Sparse(ref m) if m.len() == 3));
        assert!(validate_grid_config(&config).is_ok());
    }

    #[test]
    fn malformed_flags_are_rejected() {
        let config = with(&[("grid", "reverse", "maybe")]);
        assert!(matches!(
            validate_grid_config(&config),
            Err(GridfixError::ConfigInvalid { ref key, .. }) if key == "reverse"
        ));

        let config = with(&[("grid", "exit_on_stop_loss", "ture")]);
        assert!(matches!(
            grid_config_from(&config),
            Err(GridfixError::ConfigInvalid { ref key, .. }) if key == "exit_on_stop_loss"
        ));

        let config = with(&[("grid", "early_exit", "on"), ("grid", "reverse", "")]);
        let grid = grid_config_from(&config).unwrap();
        assert!(grid.early_exit);
        assert!(!grid.reverse);
    }

    #[test]
    fn very_deep_schema_validates() {
        let config = MapConfig::new(&[
            ("grid", "formula", "ES"),
            ("grid", "steps", "0:1, 1000000000000000:2"),
        ]);
        assert!(validate_grid_config(&config).is_ok());

        let config = with(&[("grid", "stop_loss_depth", "100000000000000000")]);
        assert!(validate_grid_config(&config).is_ok());
    }

    #[test]
    fn step_and_steps_conflict() {
        let config = with(&[("grid", "steps", "0:10")]);
        assert!(matches!(
            grid_config_from(&config),
            Err(GridfixError::ConfigInvalid { ref key, .. }) if key == "steps"
        ));
    }

    #[test]
    fn missing_step() {
        let config = MapConfig::new(&[("grid", "formula", "ES")]);
        assert!(matches!(
            grid_config_from(&config),
            Err(GridfixError::ConfigMissing { ref key, .. }) if key == "step"
        ));
    }

    #[test]
    fn non_numeric_value() {
        let config = with(&[("grid", "max_position", "lots")]);
        assert!(matches!(
            validate_grid_config(&config),
            Err(GridfixError::ConfigInvalid { ref key, .. }) if key == "max_position"
        ));
    }

    #[test]
    fn bad_side() {
        let config = with(&[("grid", "side", "sideways")]);
        assert!(validate_grid_config(&config).is_err());
    }

    #[test]
    fn bad_formula() {
        let config = MapConfig::new(&[("grid", "formula", "ES -"), ("grid", "step", "1")]);
        assert!(matches!(
            validate_grid_config(&config),
            Err(GridfixError::Formula(_))
        ));
    }

    #[test]
    fn stop_loss_depth_zero_rejected() {
        let config = with(&[("grid", "stop_loss_depth", "0")]);
        assert!(validate_grid_config(&config).is_err());
    }

    #[test]
    fn missing_formula_and_symbol() {
        let config = MapConfig::new(&[("grid", "step", "1")]);
        assert!(matches!(
            validate_grid_config(&config),
            Err(GridfixError::ConfigMissing { ref key, .. }) if key == "formula"
        ));
    }

    #[test]
    fn data_section_requires_path_and_exchange() {
        let config = MapConfig::new(&[("data", "path", "./data")]);
        assert!(matches!(
            validate_data_config(&config),
            Err(GridfixError::ConfigMissing { ref key, .. }) if key == "exchange"
        ));
    }

    #[test]
    fn dates_ordered() {
        let config = with(&[
            ("data", "start_date", "2024-06-01"),
            ("data", "end_date", "2024-01-01"),
        ]);
        assert!(validate_data_config(&config).is_err());

        let config = with(&[("data", "start_date", "2024/06/01")]);
        assert!(validate_data_config(&config).is_err());

        let config = with(&[
            ("data", "start_date", "2024-01-01"),
            ("data", "end_date", "2024-06-01"),
        ]);
        let (start, end) = data_window(&config).unwrap();
        assert!(start.is_some() && end.is_some());
    }

    #[test]
    fn rebalance_defaults_and_validation() {
        let config = with(&[]);
        assert_eq!(rebalance_params(&config).unwrap(), (100_000.0, 90));
        assert!(validate_rebalance_config(&config).is_ok());

        let config = with(&[("rebalance", "amount", "-5")]);
        assert!(validate_rebalance_config(&config).is_err());

        let config = with(&[
            ("rebalance", "rebalance_days", "30"),
            ("rebalance", "amount", "5000"),
        ]);
        assert_eq!(rebalance_params(&config).unwrap(), (5000.0, 30));
    }
}
