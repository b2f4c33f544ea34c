use std::fmt;

/// Errors raised while saving, restoring or configuring an engine.
///
/// Per-sample processing never fails; only the persistence and setup
/// surfaces return these.
#[derive(Debug)]
pub enum StateError {
    /// The JSON state record could not be encoded or decoded.
    Json(serde_json::Error),
    /// A sample blob did not match the engine's buffer layout.
    BlobSize { expected: usize, found: usize },
    /// A configuration value is out of its accepted range.
    InvalidConfig { field: &'static str, reason: String },
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::Json(e) => write!(f, "State record error: {e}"),
            StateError::BlobSize { expected, found } => {
                write!(f, "Sample blob is {found} bytes, expected {expected}")
            }
            StateError::InvalidConfig { field, reason } => {
                write!(f, "Invalid config field '{field}': {reason}")
            }
        }
    }
}

impl std::error::Error for StateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StateError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for StateError {
    fn from(e: serde_json::Error) -> Self {
        StateError::Json(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_size_message() {
        let e = StateError::BlobSize { expected: 8, found: 3 };
        assert_eq!(e.to_string(), "Sample blob is 3 bytes, expected 8");
    }

    #[test]
    fn test_json_error_converts() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{");
        let e: StateError = parse.unwrap_err().into();
        assert!(matches!(e, StateError::Json(_)));
        assert!(std::error::Error::source(&e).is_some());
    }
}
