use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bitmap::Axis;

/// Structured error taxonomy with stable codes
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RefineError {
    #[error("E_INPUT: invalid input: {message}")]
    InvalidInput { message: String },

    #[error("E_GRID_DETECT: no grid candidate along the {axis} axis")]
    GridDetectionFailed { axis: Axis },

    #[error("E_NO_CONTENT: no pixel with alpha >= {threshold}")]
    ContentNotFound { threshold: u8 },

    #[error("E_PALETTE: no registered palette for mode '{name}'")]
    UnknownPalette { name: String },

    #[error("E_INTERNAL: invariant violated: {message}")]
    InternalInvariant { message: String },
}

impl RefineError {
    /// Get structured error code for logging and monitoring
    pub fn code(&self) -> &'static str {
        match self {
            RefineError::InvalidInput { .. } => "E_INPUT",
            RefineError::GridDetectionFailed { .. } => "E_GRID_DETECT",
            RefineError::ContentNotFound { .. } => "E_NO_CONTENT",
            RefineError::UnknownPalette { .. } => "E_PALETTE",
            RefineError::InternalInvariant { .. } => "E_INTERNAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        let err = RefineError::GridDetectionFailed { axis: Axis::X };
        assert_eq!(err.code(), "E_GRID_DETECT");
        assert!(err.to_string().starts_with("E_GRID_DETECT"));

        let err = RefineError::ContentNotFound { threshold: 16 };
        assert_eq!(err.code(), "E_NO_CONTENT");
    }
}
