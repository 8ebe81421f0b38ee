//! Settings errors.

use thiserror::Error;

/// Why settings could not be produced.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read beacon settings: {0}")]
    Io(#[from] std::io::Error),
    /// The settings file is not valid JSON, or does not match the schema.
    #[error("malformed beacon settings: {0}")]
    Json(#[from] serde_json::Error),
    /// A value is well-formed but unusable, e.g. a shard index past the count.
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
}

/// Shorthand for settings results.
pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_pair_message() {
        let err = SettingsError::InvalidValue("shard index 2 >= shard count 2".into());
        assert_eq!(
            err.to_string(),
            "invalid settings value: shard index 2 >= shard count 2"
        );
    }

    #[test]
    fn malformed_json_converts() {
        let source = serde_json::from_str::<serde_json::Value>("[1,").unwrap_err();
        let err = SettingsError::from(source);
        assert!(matches!(err, SettingsError::Json(_)));
        assert!(err.to_string().starts_with("malformed beacon settings"));
    }
}
