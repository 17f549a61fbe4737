//! Grid (step-ladder) backtest simulator.
//!
//! Walks a price series tick by tick, adding one unit each time price moves a
//! step against the position and closing the most recent unit each time it
//! moves a step back. Grid spacing depends on the current depth through a
//! [`StepSchema`]. Produces mark-to-market, realized-only and position
//! sequences aligned with the input.

use crate::domain::error::GridfixError;
use crate::domain::step_schema::StepSchema;
use crate::domain::tick::{validate_ticks, PriceTick};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Which direction the ladder opens in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Long,
    Short,
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "long" | "buy" => Ok(Side::Long),
            "short" | "sell" => Ok(Side::Short),
            other => Err(format!("expected long or short, found '{}'", other)),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

/// Upper bound on `initial_position`; every seeded unit is held on the
/// level stack.
pub const MAX_INITIAL_POSITION: usize = 1_000_000;

/// Step sizes as supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum StepSpec {
    Scalar(f64),
    Sparse(BTreeMap<i64, Option<f64>>),
}

impl StepSpec {
    /// Expand to a schema resolvable at least up to `end_pos`.
    pub fn expand(&self, end_pos: Option<usize>) -> Result<StepSchema, GridfixError> {
        match self {
            StepSpec::Scalar(step) => StepSchema::scalar(*step, end_pos),
            StepSpec::Sparse(sparse) => StepSchema::expand(sparse, end_pos),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridConfig {
    pub steps: StepSpec,
    pub side: Side,
    /// Flip the sign of every fill.
    pub reverse: bool,
    /// Half-width of the band around the trend that blocks opening fills.
    pub width: f64,
    pub stop_loss_depth: Option<usize>,
    pub book_spread: f64,
    pub fee_per_side: f64,
    /// Stop once flat again after the first close.
    pub early_exit: bool,
    pub initial_position: usize,
    pub exit_on_stop_loss: bool,
    pub max_position: Option<usize>,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            steps: StepSpec::Scalar(1.0),
            side: Side::Long,
            reverse: false,
            width: 0.0,
            stop_loss_depth: None,
            book_spread: 0.0,
            fee_per_side: 0.0,
            early_exit: false,
            initial_position: 0,
            exit_on_stop_loss: false,
            max_position: None,
        }
    }
}

impl GridConfig {
    pub fn with_step(step: f64) -> Self {
        GridConfig {
            steps: StepSpec::Scalar(step),
            ..GridConfig::default()
        }
    }

    /// Check parameters and expand the step schema.
    pub fn resolve_schema(&self) -> Result<StepSchema, GridfixError> {
        let invalid = |key: &str, reason: String| GridfixError::ConfigInvalid {
            section: "grid".into(),
            key: key.into(),
            reason,
        };

        if !self.fee_per_side.is_finite() || self.fee_per_side < 0.0 {
            return Err(invalid(
                "fee_per_side",
                "fee_per_side must be a non-negative number".into(),
            ));
        }
        if !self.book_spread.is_finite() || self.book_spread < 0.0 {
            return Err(invalid(
                "book_spread",
                "book_spread must be a non-negative number".into(),
            ));
        }
        if !self.width.is_finite() {
            return Err(invalid("width", "width must be finite".into()));
        }
        if self.stop_loss_depth == Some(0) {
            return Err(invalid(
                "stop_loss_depth",
                "stop_loss_depth must be at least 1".into(),
            ));
        }
        if self.max_position == Some(0) {
            return Err(invalid(
                "max_position",
                "max_position must be at least 1".into(),
            ));
        }
        if self.initial_position > MAX_INITIAL_POSITION {
            return Err(invalid(
                "initial_position",
                format!(
                    "initial_position {} exceeds the limit of {}",
                    self.initial_position, MAX_INITIAL_POSITION
                ),
            ));
        }
        if let Some(max) = self.max_position {
            if self.initial_position > max {
                return Err(invalid(
                    "initial_position",
                    format!(
                        "initial_position {} exceeds max_position {}",
                        self.initial_position, max
                    ),
                ));
            }
        }

        let end_pos = match (self.stop_loss_depth, self.max_position) {
            (None, None) => None,
            (a, b) => Some(a.unwrap_or(0).max(b.unwrap_or(0))),
        };
        let schema = self.steps.expand(end_pos)?;

        if !schema.allows(self.initial_position) {
            return Err(GridfixError::step_schema(format!(
                "initial_position {} lies beyond the last defined step",
                self.initial_position
            )));
        }
        if let (Some(max), Some(sl)) = (self.max_position, self.stop_loss_depth) {
            if max < sl {
                tracing::warn!(
                    max_position = max,
                    stop_loss_depth = sl,
                    "max_position is below stop_loss_depth; the stop loss can never trigger"
                );
            }
        }

        Ok(schema)
    }

    fn direction(&self) -> i64 {
        if self.reverse { -1 } else { 1 }
    }
}

/// Mutable state of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    /// `None` until the ladder is first armed; the initial position is
    /// seeded exactly once at that moment.
    pub position: Option<i64>,
    pub open_money: f64,
    pub fee: f64,
    pub next_buy_price: Option<f64>,
    pub next_sell_price: Option<f64>,
    pub current_step: f64,
    /// Fill prices of open units, most recent last.
    pub levels_stack: Vec<f64>,
    pub closes: usize,
    pub fills: usize,
    pub liquidations: usize,
    pub fix_only: f64,
}

impl SimulationState {
    fn new(base_step: f64) -> Self {
        SimulationState {
            position: None,
            open_money: 0.0,
            fee: 0.0,
            next_buy_price: None,
            next_sell_price: None,
            current_step: base_step,
            levels_stack: Vec::new(),
            closes: 0,
            fills: 0,
            liquidations: 0,
            fix_only: 0.0,
        }
    }

    pub fn net_position(&self) -> i64 {
        self.position.unwrap_or(0)
    }

    pub fn revaluation(&self, price: f64) -> f64 {
        self.open_money + self.net_position() as f64 * price - self.fee
    }
}

/// One output row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixPoint {
    pub timestamp: NaiveDateTime,
    pub reval: f64,
    pub fix: f64,
    pub position: i64,
    pub closes: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EquityCurve {
    pub points: Vec<FixPoint>,
}

impl EquityCurve {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.points.iter().map(|p| p.timestamp).collect()
    }

    pub fn reval(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.reval).collect()
    }

    pub fn fix(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.fix).collect()
    }

    pub fn positions(&self) -> Vec<i64> {
        self.points.iter().map(|p| p.position).collect()
    }
}

/// Why the walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    EndOfData,
    EarlyExit,
    StopLoss,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridRun {
    pub curve: EquityCurve,
    /// Timestamp of the last tick visited, including a tick that ended the
    /// walk without being recorded.
    pub last_timestamp: Option<NaiveDateTime>,
    pub termination: Termination,
    pub state: SimulationState,
}

struct GridSimulator<'a> {
    config: &'a GridConfig,
    schema: StepSchema,
    direction: i64,
    state: SimulationState,
}

impl<'a> GridSimulator<'a> {
    fn new(config: &'a GridConfig, schema: StepSchema) -> Self {
        let state = SimulationState::new(schema.base());
        GridSimulator {
            config,
            direction: config.direction(),
            schema,
            state,
        }
    }

    fn step_at(&self, depth: u64) -> f64 {
        self.schema
            .at(depth as usize)
            .unwrap_or(self.state.current_step)
    }

    /// Seed the initial position on first use, then place the entry trigger
    /// one base step from the entry price. While flat the entry trigger only
    /// ever moves toward price, so a pullback of one step from the best price
    /// seen since arming opens the ladder.
    fn arm(&mut self, buy_px: f64, sell_px: f64) {
        let dir = self.direction as f64;
        let initial = self.config.initial_position;

        if self.state.position.is_none() {
            let seeded = initial as i64 * self.direction;
            match self.config.side {
                Side::Long => {
                    self.state.open_money -= initial as f64 * buy_px * dir;
                    self.state.position = Some(seeded);
                    self.state.levels_stack.extend(std::iter::repeat_n(buy_px, initial));
                }
                Side::Short => {
                    self.state.open_money += initial as f64 * sell_px * dir;
                    self.state.position = Some(-seeded);
                    self.state.levels_stack.extend(std::iter::repeat_n(sell_px, initial));
                }
            }
        }

        let distance = self.schema.base();
        match self.config.side {
            Side::Long => {
                let entry = buy_px - distance;
                if self.state.next_buy_price.is_none_or(|b| entry > b) {
                    self.state.next_buy_price = Some(entry);
                    self.state.next_sell_price = Some(buy_px + distance);
                }
            }
            Side::Short => {
                let entry = sell_px + distance;
                if self.state.next_sell_price.is_none_or(|s| entry < s) {
                    self.state.next_sell_price = Some(entry);
                    self.state.next_buy_price = Some(sell_px - distance);
                }
            }
        }
        self.state.current_step = self.step_at(self.state.net_position().unsigned_abs());
    }

    fn passes_trend(&self, tick: &PriceTick, price: f64, buying: bool) -> bool {
        match tick.trend {
            None => true,
            Some(trend) if buying => price < trend - self.config.width,
            Some(trend) => price > trend + self.config.width,
        }
    }

    fn within_cap(&self, exposure: i64) -> bool {
        self.config
            .max_position
            .is_none_or(|max| exposure < max as i64)
    }

    fn buy_triggered(&self, tick: &PriceTick, buy_px: f64, next_buy: f64) -> bool {
        let position = self.state.net_position();
        let exposure = position * self.direction;
        let opening = self.config.side == Side::Long && self.passes_trend(tick, buy_px, true);
        let closing = self.config.side == Side::Short && exposure < 0;
        let target = (position + self.direction).unsigned_abs() as usize;

        buy_px <= next_buy
            && (opening || closing)
            && self.within_cap(exposure)
            && self.schema.allows(target)
    }

    fn sell_triggered(&self, tick: &PriceTick, sell_px: f64, next_sell: f64) -> bool {
        let position = self.state.net_position();
        let exposure = position * self.direction;
        let opening = self.config.side == Side::Short && self.passes_trend(tick, sell_px, false);
        let closing = self.config.side == Side::Long && exposure > 0;
        let target = (position - self.direction).unsigned_abs() as usize;

        sell_px >= next_sell
            && (opening || closing)
            && self.within_cap(-exposure)
            && self.schema.allows(target)
    }

    /// Entering from flat on the opening side needs the entry mask.
    fn fill_allowed(&self, tick: &PriceTick, closing_side: Side) -> bool {
        self.state.net_position() != 0 || self.config.side == closing_side || tick.entry_allowed
    }

    fn fill_buy(&mut self, index: usize, buy_px: f64, next_buy: f64) {
        let dir = self.direction as f64;
        let fee = self.config.fee_per_side;

        self.state.open_money -= buy_px * dir;
        let position = self.state.net_position() + self.direction;
        self.state.position = Some(position);
        self.state.fee += fee;
        self.state.fills += 1;

        let depth = position.unsigned_abs();
        let old_step = self.state.current_step;
        let new_step = self.step_at(depth);

        match self.config.side {
            Side::Short => {
                self.state.closes += 1;
                if let Some(entry) = self.state.levels_stack.pop() {
                    self.state.fix_only += (entry - buy_px) * dir - 2.0 * fee;
                }
                let older_step = self
                    .schema
                    .previous(depth as usize)
                    .unwrap_or(self.schema.base());
                self.state.next_sell_price = Some(next_buy + new_step);
                self.state.next_buy_price = Some(next_buy - older_step);
            }
            Side::Long => {
                self.state.levels_stack.push(buy_px);
                let lowered = next_buy - new_step;
                self.state.next_buy_price = Some(lowered);
                self.state.next_sell_price = Some(lowered + new_step + old_step);
            }
        }
        self.state.current_step = new_step;

        tracing::debug!(
            tick = index,
            price = buy_px,
            position,
            next_buy = self.state.next_buy_price,
            next_sell = self.state.next_sell_price,
            "grid buy"
        );
    }

    fn fill_sell(&mut self, index: usize, sell_px: f64, next_sell: f64) {
        let dir = self.direction as f64;
        let fee = self.config.fee_per_side;

        self.state.open_money += sell_px * dir;
        let position = self.state.net_position() - self.direction;
        self.state.position = Some(position);
        self.state.fee += fee;
        self.state.fills += 1;

        let depth = position.unsigned_abs();
        let old_step = self.state.current_step;
        let new_step = self.step_at(depth);

        match self.config.side {
            Side::Long => {
                self.state.closes += 1;
                if let Some(entry) = self.state.levels_stack.pop() {
                    self.state.fix_only += (sell_px - entry) * dir - 2.0 * fee;
                }
                let older_step = self
                    .schema
                    .previous(depth as usize)
                    .unwrap_or(self.schema.base());
                self.state.next_buy_price = Some(next_sell - new_step);
                self.state.next_sell_price = Some(next_sell + older_step);
            }
            Side::Short => {
                self.state.levels_stack.push(sell_px);
                let raised = next_sell + new_step;
                self.state.next_sell_price = Some(raised);
                self.state.next_buy_price = Some(raised - new_step - old_step);
            }
        }
        self.state.current_step = new_step;

        tracing::debug!(
            tick = index,
            price = sell_px,
            position,
            next_buy = self.state.next_buy_price,
            next_sell = self.state.next_sell_price,
            "grid sell"
        );
    }

    fn record(&self, tick: &PriceTick, curve: &mut EquityCurve) {
        curve.points.push(FixPoint {
            timestamp: tick.timestamp,
            reval: self.state.revaluation(tick.price),
            fix: self.state.fix_only,
            position: self.state.net_position(),
            closes: self.state.closes,
        });
    }

    fn run(mut self, ticks: &[PriceTick]) -> GridRun {
        let spread = self.config.book_spread * self.direction as f64;
        let mut curve = EquityCurve {
            points: Vec::with_capacity(ticks.len()),
        };
        let mut last_timestamp = None;
        let mut termination = Termination::EndOfData;

        for (index, tick) in ticks.iter().enumerate() {
            let buy_px = tick.price + spread;
            let sell_px = tick.price - spread;
            last_timestamp = Some(tick.timestamp);

            if self.state.net_position() == 0 {
                if self.config.early_exit && self.state.closes > 0 {
                    tracing::debug!(tick = index, "early exit after first round trip");
                    termination = Termination::EarlyExit;
                    break;
                }
                if tick.entry_allowed {
                    self.arm(buy_px, sell_px);
                }
            }

            if let (Some(next_buy), Some(next_sell)) =
                (self.state.next_buy_price, self.state.next_sell_price)
            {
                if self.buy_triggered(tick, buy_px, next_buy) {
                    if self.fill_allowed(tick, Side::Short) {
                        self.fill_buy(index, buy_px, next_buy);
                    }
                } else if self.sell_triggered(tick, sell_px, next_sell)
                    && self.fill_allowed(tick, Side::Long)
                {
                    self.fill_sell(index, sell_px, next_sell);
                }
            }

            // Mark-to-market is taken before any stop-loss flatten.
            let reval = self.state.revaluation(tick.price);
            let fix = self.state.fix_only;

            let depth = self.state.net_position().unsigned_abs() as usize;
            if let Some(stop) = self.config.stop_loss_depth.filter(|&sl| depth >= sl) {
                if self.config.exit_on_stop_loss {
                    self.record(tick, &mut curve);
                    tracing::debug!(tick = index, depth, stop, "stop loss reached, ending walk");
                    termination = Termination::StopLoss;
                    break;
                }
                let position = self.state.net_position();
                let exit_px = if position < 0 { buy_px } else { sell_px };
                self.state.open_money += position as f64 * exit_px;
                self.state.position = Some(0);
                self.state.levels_stack.clear();
                self.state.liquidations += 1;
                tracing::debug!(
                    tick = index,
                    price = exit_px,
                    liquidated = position,
                    "stop loss liquidation"
                );
            }

            curve.points.push(FixPoint {
                timestamp: tick.timestamp,
                reval,
                fix,
                position: self.state.net_position(),
                closes: self.state.closes,
            });
        }

        GridRun {
            curve,
            last_timestamp,
            termination,
            state: self.state,
        }
    }
}

/// Run the grid simulator over `ticks` in order.
///
/// Configuration problems and non-finite input fail before the walk starts.
/// An empty series yields an empty curve and no last timestamp.
pub fn run_grid(ticks: &[PriceTick], config: &GridConfig) -> Result<GridRun, GridfixError> {
    let schema = config.resolve_schema()?;
    validate_ticks(ticks)?;

    tracing::debug!(
        ticks = ticks.len(),
        side = %config.side,
        schema = %schema,
        resolved_depth = schema.max_depth(),
        "starting grid run"
    );

    Ok(GridSimulator::new(config, schema).run(ticks))
}
