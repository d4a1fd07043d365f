//! Reconcilable resources (desired state + diff) and their collaborators.
pub mod acl_inheritance;
pub mod remote_syslog;

use std::fmt;

use serde_json::{Map, Value};

use crate::error::ReconcileError;

/// The live system a resource is reconciled against.
///
/// Each implementation owns one identifying key (a path, a remote host) and
/// answers questions about that single entity.  Test doubles implement this
/// trait directly.
pub trait Collaborator {
    /// Normalized current state of the entity.
    type Current;
    /// A change the collaborator knows how to apply.
    type Changes;

    /// Whether the entity exists.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] if the system cannot be queried or the key
    /// is ambiguous.
    fn exists(&self) -> Result<bool, ReconcileError>;

    /// Read the current state of an existing entity.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] if the system cannot be queried or the
    /// entity has disappeared.
    fn read_current(&self) -> Result<Self::Current, ReconcileError>;

    /// Create the entity.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] if the write is rejected.
    fn create(&self, changes: &Self::Changes) -> Result<(), ReconcileError>;

    /// Update the existing entity.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] if the write is rejected.
    fn update(&self, changes: &Self::Changes) -> Result<(), ReconcileError>;
}

/// Desired state of one entity plus the rules for diffing and reporting it.
pub trait Resource {
    /// Normalized current state, as read by the collaborator.
    type Current;
    /// Change set; displayed in logs.
    type Changes: fmt::Display;

    /// Module name used in results and the summary.
    fn module(&self) -> &'static str;

    /// Human-readable description of the entity.
    fn description(&self) -> String;

    /// The change that creates a missing entity, or `None` if it should stay
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] if a missing entity is itself an error.
    fn plan_create(&self) -> Result<Option<Self::Changes>, ReconcileError>;

    /// The change that converges an existing entity, or `None` if it already
    /// matches.
    fn diff(&self, current: &Self::Current) -> Option<Self::Changes>;

    /// Attributes echoed when `changes` was (or would be) applied.
    fn report_changes(&self, changes: &Self::Changes) -> Map<String, Value>;

    /// Attributes echoed when nothing changed, with their effective values.
    fn report_unchanged(&self, current: Option<&Self::Current>) -> Map<String, Value>;
}
