use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DcfError {
    #[error("Missing input: {field} — {reason}")]
    MissingInput { field: String, reason: String },

    #[error("Shape mismatch: {field} has {actual} entries, expected {expected}")]
    ShapeMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid rate spread: WACC ({wacc}) must be greater than terminal growth ({terminal_growth})")]
    InvalidRateSpread {
        wacc: Decimal,
        terminal_growth: Decimal,
    },

    #[error("Division by zero in {context}")]
    DivideByZero { context: String },

    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Scenario '{name}' failed: {source}")]
    Scenario {
        name: String,
        #[source]
        source: Box<DcfError>,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Discriminant of a [`DcfError`], with scenario wrappers looked through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DcfErrorKind {
    MissingInput,
    ShapeMismatch,
    InvalidRateSpread,
    DivideByZero,
    InvalidInput,
    Serialization,
}

impl DcfError {
    /// Root cause kind. For `Scenario` this is the kind of the wrapped error.
    pub fn kind(&self) -> DcfErrorKind {
        match self {
            DcfError::MissingInput { .. } => DcfErrorKind::MissingInput,
            DcfError::ShapeMismatch { .. } => DcfErrorKind::ShapeMismatch,
            DcfError::InvalidRateSpread { .. } => DcfErrorKind::InvalidRateSpread,
            DcfError::DivideByZero { .. } => DcfErrorKind::DivideByZero,
            DcfError::InvalidInput { .. } => DcfErrorKind::InvalidInput,
            DcfError::Scenario { source, .. } => source.kind(),
            DcfError::Serialization(_) => DcfErrorKind::Serialization,
        }
    }

    /// Name of the failing scenario, if this error came out of the scenario runner.
    pub fn scenario_name(&self) -> Option<&str> {
        match self {
            DcfError::Scenario { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for DcfError {
    fn from(e: serde_json::Error) -> Self {
        DcfError::Serialization(e.to_string())
    }
}
