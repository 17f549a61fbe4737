//! Step schema: grid spacing as a function of position depth.
//!
//! A sparse `depth -> step` mapping resolves every depth to the step of the
//! nearest defined depth at or below it. A `None` step marks the depth the
//! ladder may not reach. Only the defined depths are stored, so very deep
//! schemas and stop depths cost nothing extra.

use crate::domain::error::GridfixError;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct StepSchema {
    steps: BTreeMap<usize, Option<f64>>,
    /// Deepest depth the schema was resolved for.
    end: usize,
}

impl StepSchema {
    /// Single step at every depth.
    pub fn scalar(step: f64, end_pos: Option<usize>) -> Result<Self, GridfixError> {
        let mut sparse = BTreeMap::new();
        sparse.insert(0, Some(step));
        Self::expand(&sparse, end_pos)
    }

    /// Resolve a sparse schema so every depth in
    /// `0..=max(end_pos, highest key)` has a step (or an explicit `None`).
    pub fn expand(
        sparse: &BTreeMap<i64, Option<f64>>,
        end_pos: Option<usize>,
    ) -> Result<Self, GridfixError> {
        if let Some((&key, _)) = sparse.iter().find(|(k, _)| **k < 0) {
            return Err(GridfixError::step_schema(format!(
                "depth {} is negative; depths must be non-negative",
                key
            )));
        }
        match sparse.get(&0) {
            None => {
                return Err(GridfixError::step_schema("depth 0 must be defined"));
            }
            Some(None) => {
                return Err(GridfixError::step_schema(
                    "depth 0 must have a step size",
                ));
            }
            Some(Some(_)) => {}
        }

        let mut steps = BTreeMap::new();
        for (&depth, &step) in sparse {
            if let Some(step) = step {
                if !step.is_finite() || step < 0.0 {
                    return Err(GridfixError::step_schema(format!(
                        "step at depth {} must be a non-negative number, got {}",
                        depth, step
                    )));
                }
            }
            let depth = usize::try_from(depth).map_err(|_| {
                GridfixError::step_schema(format!("depth {} is out of range", depth))
            })?;
            steps.insert(depth, step);
        }

        let highest = steps.keys().next_back().copied().unwrap_or(0);
        let end = highest.max(end_pos.unwrap_or(0));

        Ok(StepSchema { steps, end })
    }

    /// Parse a sparse schema from `depth:step` pairs, e.g. `0:10, 3:15, 6:none`.
    pub fn parse_sparse(input: &str) -> Result<BTreeMap<i64, Option<f64>>, GridfixError> {
        let mut sparse = BTreeMap::new();
        for token in input.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let (depth, step) = token.split_once(':').ok_or_else(|| {
                GridfixError::step_schema(format!("expected depth:step, found '{}'", token))
            })?;
            let depth: i64 = depth.trim().parse().map_err(|_| {
                GridfixError::step_schema(format!("invalid depth '{}'", depth.trim()))
            })?;
            let step = match step.trim().to_lowercase().as_str() {
                "none" | "null" | "" => None,
                s => Some(s.parse::<f64>().map_err(|_| {
                    GridfixError::step_schema(format!("invalid step '{}'", s))
                })?),
            };
            if sparse.insert(depth, step).is_some() {
                return Err(GridfixError::step_schema(format!(
                    "depth {} defined twice",
                    depth
                )));
            }
        }
        Ok(sparse)
    }

    /// Step at `depth`: the entry of the nearest defined depth at or below it.
    pub fn at(&self, depth: usize) -> Option<f64> {
        self.steps
            .range(..=depth)
            .next_back()
            .and_then(|(_, step)| *step)
    }

    /// Step at depth 0, always defined.
    pub fn base(&self) -> f64 {
        self.steps.get(&0).copied().flatten().unwrap_or(0.0)
    }

    /// Step one level shallower than `depth`, or the base step at depth 0.
    pub fn previous(&self, depth: usize) -> Option<f64> {
        match depth.checked_sub(1) {
            Some(d) => self.at(d),
            None => Some(self.base()),
        }
    }

    /// Whether the ladder may stand at `depth`.
    pub fn allows(&self, depth: usize) -> bool {
        self.at(depth).is_some()
    }

    /// Deepest depth the schema was resolved for.
    pub fn max_depth(&self) -> usize {
        self.end
    }
}

impl fmt::Display for StepSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut prev: Option<Option<f64>> = None;
        let mut parts = Vec::new();
        for (&depth, &step) in &self.steps {
            if prev != Some(step) {
                match step {
                    Some(s) => parts.push(format!("{}:{}", depth, s)),
                    None => parts.push(format!("{}:none", depth)),
                }
            }
            prev = Some(step);
        }
        write!(f, "{}", parts.join(", "))
    }
}
