pub mod error;
pub mod types;

#[cfg(feature = "valuation")]
pub mod valuation;

#[cfg(feature = "scenarios")]
pub mod scenarios;

#[cfg(feature = "export")]
pub mod export;

pub use error::{DcfError, DcfErrorKind};
pub use types::*;

/// Standard result type for all DCF engine operations
pub type DcfResult<T> = Result<T, DcfError>;
