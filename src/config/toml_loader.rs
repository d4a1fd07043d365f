//! TOML argument file parsing.
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::error::ValidationError;

/// Read and deserialize a TOML argument file.
///
/// Unlike optional configuration, an argument file must exist: a missing file
/// is an I/O error.  Parse failures (bad syntax, unknown keys, wrong value
/// types) surface as [`ValidationError::Malformed`] so callers can tell bad
/// input apart from an unreadable file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_args<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read argument file: {}", path.display()))?;

    parse_args(&content, &path.display().to_string()).map_err(Into::into)
}

/// Deserialize TOML text, naming `source_name` in the error.
///
/// # Errors
///
/// Returns [`ValidationError::Malformed`] if the text is not valid for `T`.
pub fn parse_args<T: DeserializeOwned>(
    content: &str,
    source_name: &str,
) -> Result<T, ValidationError> {
    toml::from_str(content).map_err(|e| ValidationError::Malformed {
        source_name: source_name.to_string(),
        message: e.message().to_string(),
    })
}
