//! ACL inheritance arguments.
use std::path::PathBuf;

use serde::Deserialize;

use super::{State, required};
use crate::error::ValidationError;

/// Raw ACL inheritance arguments as supplied by the user.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AclInheritanceArgs {
    /// Path whose inheritance should be changed.
    pub path: Option<String>,
    /// `present` enables inheritance, `absent` disables it.
    pub state: Option<State>,
    /// Convert inherited entries to explicit ones (disable) or drop explicit
    /// duplicates of inherited ones (enable).
    pub reorganize: Option<bool>,
}

/// Validated ACL inheritance parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclInheritanceParams {
    /// Target path.
    pub path: PathBuf,
    /// Desired inheritance state.
    pub state: State,
    /// Whether to reorganize entries during the transition.
    pub reorganize: bool,
}

impl AclInheritanceParams {
    /// Whether inheritance should be enabled.
    #[must_use]
    pub fn inheritance_enabled(&self) -> bool {
        self.state == State::Present
    }
}

impl AclInheritanceArgs {
    /// Validate and normalize into [`AclInheritanceParams`].
    ///
    /// `state` defaults to `absent` and `reorganize` to `false`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if `path` is missing or empty.
    pub fn normalize(&self) -> Result<AclInheritanceParams, ValidationError> {
        let path = required("path", self.path.as_deref())?;
        Ok(AclInheritanceParams {
            path: PathBuf::from(path),
            state: self.state.unwrap_or(State::Absent),
            reorganize: self.reorganize.unwrap_or(false),
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_absent_without_reorganize() {
        let args = AclInheritanceArgs {
            path: Some("C:\\apache".to_string()),
            ..AclInheritanceArgs::default()
        };
        let params = args.normalize().unwrap();
        assert_eq!(params.path, PathBuf::from("C:\\apache"));
        assert_eq!(params.state, State::Absent);
        assert!(!params.reorganize);
        assert!(!params.inheritance_enabled());
    }

    #[test]
    fn explicit_values_are_kept() {
        let args = AclInheritanceArgs {
            path: Some("C:\\apache".to_string()),
            state: Some(State::Present),
            reorganize: Some(true),
        };
        let params = args.normalize().unwrap();
        assert!(params.inheritance_enabled());
        assert!(params.reorganize);
    }

    #[test]
    fn missing_path_is_rejected() {
        let err = AclInheritanceArgs::default().normalize().unwrap_err();
        assert_eq!(err, ValidationError::Missing("path"));
    }

    #[test]
    fn unknown_state_is_rejected_by_deserializer() {
        let result: Result<AclInheritanceArgs, _> =
            toml::from_str("path = 'C:\\x'\nstate = \"enabled\"\n");
        assert!(result.is_err());
    }
}
