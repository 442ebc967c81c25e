use thiserror::Error;

/// Raised while parsing a vendor fault-report section or a processor trace.
///
/// `line` is 1-based within the text handed to the parser.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{section} parse error at line {line}: {message}")]
pub struct ParseError {
    pub section: &'static str,
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(section: &'static str, line: usize, message: impl Into<String>) -> Self {
        Self {
            section,
            line,
            message: message.into(),
        }
    }
}

/// Raised while evaluating a coverage formula against fault tallies.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoverageError {
    #[error("unknown coverage formula '{0}'")]
    UnknownFormula(String),
    #[error("unknown symbol '{0}' in coverage expression")]
    UnknownSymbol(String),
    #[error("malformed coverage expression '{expr}': {message}")]
    BadExpression { expr: String, message: String },
}

/// Raised when a logic simulation ran but its outcome could not be classified.
///
/// Both variants indicate a misconfigured success pattern and are fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LogicSimulationError {
    #[error(
        "simulation status was not set during the execution of {command:?}; \
         is the success regular expression correct?"
    )]
    NoMatch { command: Vec<String> },
    #[error(
        "test application time '{capture}' could not be converted to a \
         non-negative integer; check the capture group of the success pattern"
    )]
    BadTat { capture: String },
}

/// Raised by the trace-table query interface.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TraceQueryError {
    #[error("no trace row found for {0}")]
    NotFound(String),
    #[error("query resulted in multiple trace rows for {0}")]
    Ambiguous(String),
    #[error("trace table has not been initialised")]
    NotInitialised,
    #[error("unknown trace column '{0}'")]
    UnknownColumn(String),
}
