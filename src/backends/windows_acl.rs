//! Windows filesystem ACLs: snapshot model and a `PowerShell` accessor.
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::CollaboratorError;
use crate::exec::Executor;

const POWERSHELL: &str = "powershell";

/// One access control entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRule {
    /// Account the rule applies to, e.g. `BUILTIN\Users`.
    pub identity: String,
    /// File system rights, e.g. `ReadAndExecute, Synchronize`.
    pub rights: String,
    /// `Allow` or `Deny`.
    pub access_type: String,
    /// Inheritance flags, e.g. `ContainerInherit, ObjectInherit`.
    pub inheritance_flags: String,
    /// Propagation flags, e.g. `None`.
    pub propagation_flags: String,
    /// Whether the rule was inherited from a parent.
    pub inherited: bool,
}

impl AccessRule {
    /// Whether two rules grant the same thing, ignoring where they came from.
    #[must_use]
    pub fn same_grant(&self, other: &Self) -> bool {
        self.identity.eq_ignore_ascii_case(&other.identity)
            && self.rights == other.rights
            && self.access_type == other.access_type
            && self.inheritance_flags == other.inheritance_flags
            && self.propagation_flags == other.propagation_flags
    }
}

/// The ACL of one path as reported by `Get-Acl`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AclSnapshot {
    /// `true` unless access rules are protected from inheritance.
    pub inheritance_enabled: bool,
    /// Explicit and inherited rules.
    #[serde(default, deserialize_with = "one_or_many")]
    pub rules: Vec<AccessRule>,
}

impl AclSnapshot {
    /// Rules inherited from a parent.
    pub fn inherited(&self) -> impl Iterator<Item = &AccessRule> {
        self.rules.iter().filter(|r| r.inherited)
    }

    /// Rules set directly on the path.
    pub fn explicit(&self) -> impl Iterator<Item = &AccessRule> {
        self.rules.iter().filter(|r| !r.inherited)
    }

    /// Explicit rules that duplicate an inherited rule.
    #[must_use]
    pub fn explicit_duplicates(&self) -> Vec<&AccessRule> {
        self.explicit()
            .filter(|e| self.inherited().any(|i| i.same_grant(e)))
            .collect()
    }
}

/// How inheritance is toggled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InheritanceChange {
    /// Protect the ACL from inheritance.
    Disable {
        /// Convert inherited rules to explicit rules instead of dropping them.
        copy_inherited: bool,
    },
    /// Re-enable inheritance.
    Enable {
        /// Remove explicit rules that duplicate inherited ones.
        prune_duplicates: bool,
    },
}

impl fmt::Display for InheritanceChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disable {
                copy_inherited: true,
            } => write!(f, "disable inheritance, keeping inherited entries as explicit"),
            Self::Disable {
                copy_inherited: false,
            } => write!(f, "disable inheritance, dropping inherited entries"),
            Self::Enable {
                prune_duplicates: true,
            } => write!(f, "enable inheritance, removing duplicate explicit entries"),
            Self::Enable {
                prune_duplicates: false,
            } => write!(f, "enable inheritance"),
        }
    }
}

/// Filesystem ACL access.
#[cfg_attr(test, mockall::automock)]
pub trait AclAccessor: Send + Sync + fmt::Debug {
    /// Whether `path` exists.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError`] if the check itself fails.
    fn exists(&self, path: &Path) -> Result<bool, CollaboratorError>;

    /// Read the ACL of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError`] if the ACL cannot be read or parsed.
    fn read(&self, path: &Path) -> Result<AclSnapshot, CollaboratorError>;

    /// Apply an inheritance change to `path` in one operation.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError`] if the ACL cannot be written.
    fn apply(&self, path: &Path, change: InheritanceChange) -> Result<(), CollaboratorError>;
}

/// [`AclAccessor`] using `Get-Acl` / `Set-Acl`, one `PowerShell` process per call.
#[derive(Debug)]
pub struct PowerShellAcl {
    executor: Arc<dyn Executor>,
}

impl PowerShellAcl {
    /// Create an accessor running scripts through `executor`.
    #[must_use]
    pub const fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    fn run_script(&self, script: &str) -> Result<String, CollaboratorError> {
        let result = self
            .executor
            .run_unchecked(POWERSHELL, &["-NoProfile", "-NonInteractive", "-Command", script])
            .map_err(|e| CollaboratorError::Command {
                program: POWERSHELL.to_string(),
                stderr: format!("{e:#}"),
            })?;
        if !result.success {
            return Err(CollaboratorError::Command {
                program: POWERSHELL.to_string(),
                stderr: result.stderr.trim().to_string(),
            });
        }
        Ok(result.stdout)
    }
}

impl AclAccessor for PowerShellAcl {
    fn exists(&self, path: &Path) -> Result<bool, CollaboratorError> {
        let script = format!("Test-Path -LiteralPath '{}'", quote_path(path));
        let stdout = self.run_script(&script)?;
        match stdout.trim() {
            "True" => Ok(true),
            "False" => Ok(false),
            other => Err(CollaboratorError::InvalidResponse {
                target: "Test-Path".to_string(),
                message: format!("expected True or False, got '{other}'"),
            }),
        }
    }

    fn read(&self, path: &Path) -> Result<AclSnapshot, CollaboratorError> {
        let stdout = self.run_script(&read_script(path))?;
        serde_json::from_str(stdout.trim()).map_err(|e| CollaboratorError::InvalidResponse {
            target: "Get-Acl".to_string(),
            message: e.to_string(),
        })
    }

    /// Enabling with `prune_duplicates` re-reads the ACL once inheritance is
    /// back on, since inherited rules only show up after that `Set-Acl`, and
    /// removes exactly the explicit rules [`AclSnapshot::explicit_duplicates`]
    /// reports.
    fn apply(&self, path: &Path, change: InheritanceChange) -> Result<(), CollaboratorError> {
        self.run_script(&protection_script(path, change))?;
        if let InheritanceChange::Enable {
            prune_duplicates: true,
        } = change
        {
            let snapshot = self.read(path)?;
            let duplicates = snapshot.explicit_duplicates();
            if !duplicates.is_empty() {
                self.run_script(&remove_rules_script(path, &duplicates))?;
            }
        }
        Ok(())
    }
}

/// Escape a value for a single-quoted `PowerShell` string.
fn quote(value: &str) -> String {
    value.replace('\'', "''")
}

fn quote_path(path: &Path) -> String {
    quote(&path.display().to_string())
}

fn read_script(path: &Path) -> String {
    let p = quote_path(path);
    format!(
        "$ErrorActionPreference = 'Stop'\n\
         $acl = Get-Acl -LiteralPath '{p}'\n\
         $rules = @($acl.Access | ForEach-Object {{ [pscustomobject]@{{ \
         identity = $_.IdentityReference.Value; \
         rights = $_.FileSystemRights.ToString(); \
         accessType = $_.AccessControlType.ToString(); \
         inheritanceFlags = $_.InheritanceFlags.ToString(); \
         propagationFlags = $_.PropagationFlags.ToString(); \
         inherited = $_.IsInherited }} }})\n\
         [pscustomobject]@{{ inheritanceEnabled = -not $acl.AreAccessRulesProtected; rules = $rules }} | ConvertTo-Json -Depth 4 -Compress"
    )
}

/// Toggle protection. Disabling with `copy_inherited` keeps the inherited
/// rules as explicit ones through `SetAccessRuleProtection`'s second flag.
fn protection_script(path: &Path, change: InheritanceChange) -> String {
    let p = quote_path(path);
    let (protect, preserve) = match change {
        InheritanceChange::Disable { copy_inherited } => ("$true", bool_literal(copy_inherited)),
        InheritanceChange::Enable { .. } => ("$false", "$false"),
    };
    format!(
        "$ErrorActionPreference = 'Stop'\n\
         $acl = Get-Acl -LiteralPath '{p}'\n\
         $acl.SetAccessRuleProtection({protect}, {preserve})\n\
         Set-Acl -LiteralPath '{p}' -AclObject $acl\n"
    )
}

/// Remove each of `rules` by exact match on every field [`AccessRule::same_grant`] compares.
fn remove_rules_script(path: &Path, rules: &[&AccessRule]) -> String {
    let p = quote_path(path);
    let mut script = format!(
        "$ErrorActionPreference = 'Stop'\n\
         $acl = Get-Acl -LiteralPath '{p}'\n"
    );
    for rule in rules {
        script.push_str(&format!(
            "$acl.RemoveAccessRuleSpecific((New-Object System.Security.AccessControl.FileSystemAccessRule(\
             '{}', '{}', '{}', '{}', '{}')))\n",
            quote(&rule.identity),
            quote(&rule.rights),
            quote(&rule.inheritance_flags),
            quote(&rule.propagation_flags),
            quote(&rule.access_type),
        ));
    }
    script.push_str(&format!("Set-Acl -LiteralPath '{p}' -AclObject $acl\n"));
    script
}

const fn bool_literal(value: bool) -> &'static str {
    if value { "$true" } else { "$false" }
}

/// `ConvertTo-Json` collapses one-element arrays into a bare object.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<AccessRule>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(AccessRule),
        Many(Vec<AccessRule>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(rule)) => vec![rule],
        Some(OneOrMany::Many(rules)) => rules,
    })
}
