//! ACL inheritance resource.
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::{Collaborator, Resource};
use crate::backends::windows_acl::{AclAccessor, AclSnapshot, InheritanceChange};
use crate::config::{AclInheritanceParams, State};
use crate::error::{CollaboratorError, ReconcileError};

/// Desired inheritance state of one path.
#[derive(Debug, Clone)]
pub struct AclInheritanceResource {
    params: AclInheritanceParams,
}

impl AclInheritanceResource {
    /// Create a resource from validated parameters.
    #[must_use]
    pub const fn new(params: AclInheritanceParams) -> Self {
        Self { params }
    }

    fn report(&self, state: State) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(
            "path".to_string(),
            Value::from(self.params.path.display().to_string()),
        );
        map.insert("state".to_string(), Value::from(state.to_string()));
        map
    }
}

impl Resource for AclInheritanceResource {
    type Current = AclSnapshot;
    type Changes = InheritanceChange;

    fn module(&self) -> &'static str {
        "acl_inheritance"
    }

    fn description(&self) -> String {
        format!("acl inheritance {}", self.params.path.display())
    }

    fn plan_create(&self) -> Result<Option<InheritanceChange>, ReconcileError> {
        Err(CollaboratorError::NotFound(self.params.path.display().to_string()).into())
    }

    /// Whether a change happens depends only on the inheritance flag;
    /// `reorganize` only shapes how it is applied.
    fn diff(&self, current: &AclSnapshot) -> Option<InheritanceChange> {
        let want = self.params.inheritance_enabled();
        if current.inheritance_enabled == want {
            return None;
        }
        Some(if want {
            InheritanceChange::Enable {
                prune_duplicates: self.params.reorganize,
            }
        } else {
            InheritanceChange::Disable {
                copy_inherited: self.params.reorganize,
            }
        })
    }

    fn report_changes(&self, _changes: &InheritanceChange) -> Map<String, Value> {
        let mut map = self.report(self.params.state);
        map.insert("reorganize".to_string(), Value::from(self.params.reorganize));
        map
    }

    fn report_unchanged(&self, current: Option<&AclSnapshot>) -> Map<String, Value> {
        let state = match current {
            Some(snapshot) if !snapshot.inheritance_enabled => State::Absent,
            Some(_) => State::Present,
            None => self.params.state,
        };
        self.report(state)
    }
}

/// [`Collaborator`] for the ACL of one path.
#[derive(Debug)]
pub struct AclPathHandle {
    accessor: Arc<dyn AclAccessor>,
    path: PathBuf,
}

impl AclPathHandle {
    /// Create a handle for `path`.
    #[must_use]
    pub const fn new(accessor: Arc<dyn AclAccessor>, path: PathBuf) -> Self {
        Self { accessor, path }
    }
}

impl Collaborator for AclPathHandle {
    type Current = AclSnapshot;
    type Changes = InheritanceChange;

    fn exists(&self) -> Result<bool, ReconcileError> {
        Ok(self.accessor.exists(&self.path)?)
    }

    fn read_current(&self) -> Result<AclSnapshot, ReconcileError> {
        Ok(self.accessor.read(&self.path)?)
    }

    fn create(&self, _changes: &InheritanceChange) -> Result<(), ReconcileError> {
        Err(CollaboratorError::NotFound(self.path.display().to_string()).into())
    }

    fn update(&self, changes: &InheritanceChange) -> Result<(), ReconcileError> {
        Ok(self.accessor.apply(&self.path, *changes)?)
    }
}
