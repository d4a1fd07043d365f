//! Module argument records: raw user input, validation, and normalization.
//!
//! Each module has a raw, serde-deserializable argument struct (the allowed
//! key set) and a typed parameter struct produced by `normalize()`.  Command
//! line flags and TOML argument files both funnel through the same raw
//! structs so validation happens in exactly one place.
pub mod acl_inheritance;
pub mod remote_syslog;
pub mod toml_loader;

use std::fmt;
use std::path::Path;

use anyhow::Result;
use serde::Deserialize;

use crate::error::ValidationError;

pub use acl_inheritance::{AclInheritanceArgs, AclInheritanceParams};
pub use remote_syslog::{
    ApiRemoteServer, ApiSyslog, ConnectionParams, LocalIp, RemoteServer, RemoteSyslogArgs,
    RemoteSyslogParams,
};

/// Desired presence of the managed setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum State {
    /// The setting should exist / be enabled.
    Present,
    /// The setting should not exist / be disabled.
    Absent,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present => write!(f, "present"),
            Self::Absent => write!(f, "absent"),
        }
    }
}

/// One module invocation, as read from the command line or an argument file.
#[derive(Debug, Clone)]
pub enum ModuleArgs {
    /// Windows ACL inheritance.
    AclInheritance(AclInheritanceArgs),
    /// BIG-IP remote syslog server.
    RemoteSyslog(RemoteSyslogArgs),
}

impl ModuleArgs {
    /// Module name used in logs and results.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AclInheritance(_) => "acl_inheritance",
            Self::RemoteSyslog(_) => "remote_syslog",
        }
    }
}

/// A TOML argument file listing module invocations.
///
/// ```toml
/// [[acl_inheritance]]
/// path = 'C:\apache'
/// state = "absent"
///
/// [[remote_syslog]]
/// remote_host = "10.10.10.10"
/// server = "bigip.example.com"
/// user = "admin"
/// password = "secret"
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArgsFile {
    /// ACL inheritance invocations.
    #[serde(default)]
    pub acl_inheritance: Vec<AclInheritanceArgs>,
    /// Remote syslog invocations.
    #[serde(default)]
    pub remote_syslog: Vec<RemoteSyslogArgs>,
}

impl ArgsFile {
    /// Load and parse an argument file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, or a [`ValidationError`]
    /// (wrapped in [`anyhow::Error`]) if it contains unknown keys or values of
    /// the wrong type.
    pub fn load(path: &Path) -> Result<Self> {
        toml_loader::load_args(path)
    }

    /// Flatten into module invocations: ACL entries first, then syslog entries.
    #[must_use]
    pub fn into_modules(self) -> Vec<ModuleArgs> {
        self.acl_inheritance
            .into_iter()
            .map(ModuleArgs::AclInheritance)
            .chain(self.remote_syslog.into_iter().map(ModuleArgs::RemoteSyslog))
            .collect()
    }
}

/// Reject empty or whitespace-only strings for a required parameter.
pub(crate) fn required(
    param: &'static str,
    value: Option<&str>,
) -> Result<String, ValidationError> {
    match value.map(str::trim) {
        None => Err(ValidationError::Missing(param)),
        Some("") => Err(ValidationError::InvalidValue {
            param,
            reason: "must not be empty".to_string(),
        }),
        Some(v) => Ok(v.to_string()),
    }
}
