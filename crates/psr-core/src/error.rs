//! Error types for the analysis core.

use thiserror::Error;

/// Errors raised by the analysis pipeline.
///
/// Validation failures (`InvalidInput`, `InvalidParameter`) are reported
/// before any stage runs. `Computation` signals a defect, never a condition
/// the caller can fix.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid parameter: {field} = {value} ({reason})")]
    InvalidParameter {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Computation error: {0}")]
    Computation(String),
}

impl Error {
    pub(crate) fn invalid_parameter(
        field: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidParameter {
            field,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// True when the caller supplied bad data or configuration.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::InvalidParameter { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
