//! Core domain types and logic.

pub mod error;
pub mod tick;
pub mod step_schema;
pub mod grid;
pub mod rebalance;
pub mod rollover;
pub mod stat_arb;
pub mod time_spaced;
pub mod intersections;
pub mod risk;
pub mod metrics;
pub mod moving_average;
pub mod formula;
pub mod formula_parser;
pub mod formula_eval;
pub mod spread;
pub mod config_validation;
