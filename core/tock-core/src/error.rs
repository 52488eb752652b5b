//! Error types for tock-core operations.
//!
//! Contention and missing records are not errors: `set(TIMER_RUNNING)` failing
//! or clearing an unknown label are reported through outcome enums. Everything
//! here is either an environment failure (I/O, corrupt JSON) or a contract
//! violation by the caller (an operation the timer state forbids).

use std::path::PathBuf;

/// All errors that can occur in tock-core operations.
#[derive(Debug, thiserror::Error)]
pub enum TockError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found; set TOCK_HOME or pass --home")]
    HomeDirNotFound,

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Contract Violations
    // ─────────────────────────────────────────────────────────────────────
    #[error("Cannot {operation} timer '{label}': {reason}")]
    InvalidTransition {
        label: String,
        operation: &'static str,
        reason: &'static str,
    },

    #[error("Invalid label '{0}': labels must be non-empty and contain no path separators")]
    InvalidLabel(String),

    #[error("Invalid signal name '{0}'")]
    InvalidSignalName(String),

    // ─────────────────────────────────────────────────────────────────────
    // Worksheet Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Label {0} not found in worksheet")]
    LabelNotInSheet(String),

    #[error("Worksheet error: {0}")]
    Sheet(String),

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl TockError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        TockError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        TockError::Json {
            context: context.into(),
            source,
        }
    }

    /// True for errors caused by the caller asking for something the record's
    /// current state forbids.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            TockError::InvalidTransition { .. }
                | TockError::InvalidLabel(_)
                | TockError::InvalidSignalName(_)
        )
    }
}

/// Convenience type alias for Results using TockError.
pub type Result<T> = std::result::Result<T, TockError>;

// Conversion for string error compatibility
impl From<TockError> for String {
    fn from(err: TockError) -> String {
        err.to_string()
    }
}

/// Rejects labels that would escape their directory or collide with the
/// signal namespace.
pub(crate) fn validate_label(label: &str) -> Result<()> {
    let bad = label.is_empty()
        || label.starts_with('.')
        || label.contains('/')
        || label.contains('\\')
        || label.contains('\0');
    if bad {
        return Err(TockError::InvalidLabel(label.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_label_accepts_plain_names() {
        assert!(validate_label("code").is_ok());
        assert!(validate_label("deep-work_2").is_ok());
    }

    #[test]
    fn test_validate_label_rejects_paths() {
        assert!(validate_label("").is_err());
        assert!(validate_label("../etc").is_err());
        assert!(validate_label("a/b").is_err());
        assert!(validate_label(".signals").is_err());
    }

    #[test]
    fn test_invalid_transition_is_contract_violation() {
        let err = TockError::InvalidTransition {
            label: "code".to_string(),
            operation: "start",
            reason: "timer is already running",
        };
        assert!(err.is_contract_violation());
        assert_eq!(
            err.to_string(),
            "Cannot start timer 'code': timer is already running"
        );
    }
}
