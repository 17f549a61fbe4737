//! Domain error types.

/// A parse error with position information for formula parsing.
#[derive(Debug, Clone, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for gridfix.
#[derive(Debug, thiserror::Error)]
pub enum GridfixError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid step schema: {reason}")]
    StepSchema { reason: String },

    #[error(transparent)]
    Formula(#[from] ParseError),

    #[error("formula references unknown symbol {symbol}")]
    UnknownSymbol { symbol: String },

    #[error("invalid data at tick {index}: {reason}")]
    InvalidData { index: usize, reason: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no data for {symbol} on {exchange}")]
    NoData { symbol: String, exchange: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GridfixError {
    pub(crate) fn step_schema(reason: impl Into<String>) -> Self {
        GridfixError::StepSchema {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_data(index: usize, reason: impl Into<String>) -> Self {
        GridfixError::InvalidData {
            index,
            reason: reason.into(),
        }
    }
}

impl From<&GridfixError> for std::process::ExitCode {
    fn from(err: &GridfixError) -> Self {
        let code: u8 = match err {
            GridfixError::Io(_) => 1,
            GridfixError::ConfigParse { .. }
            | GridfixError::ConfigMissing { .. }
            | GridfixError::ConfigInvalid { .. }
            | GridfixError::StepSchema { .. } => 2,
            GridfixError::Data { .. } => 3,
            GridfixError::Formula(_) | GridfixError::UnknownSymbol { .. } => 4,
            GridfixError::NoData { .. } | GridfixError::InvalidData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
