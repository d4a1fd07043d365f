//! Core logging types: module entries, status, and the [`Log`] trait.

/// Module run result for summary reporting.
#[derive(Debug, Clone)]
pub struct ModuleEntry {
    /// Module name plus its target (e.g. `remote_syslog 10.10.10.10`).
    pub name: String,
    /// Final status of the run.
    pub status: ModuleStatus,
    /// Optional detail message (e.g. the error).
    pub message: Option<String>,
}

/// Status of a completed module run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStatus {
    /// Already in the desired state.
    Ok,
    /// A change was applied.
    Changed,
    /// Check mode; a change would have been applied.
    DryRun,
    /// The run failed.
    Failed,
}

/// Abstraction over logging backends.
///
/// [`Logger`](super::logger::Logger) is the production implementation; the
/// reconcile engine only depends on this trait.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log a check-mode action message.
    fn dry_run(&self, msg: &str);
    /// Record a module result for the summary.
    fn record_module(&self, name: &str, status: ModuleStatus, message: Option<&str>);
}
