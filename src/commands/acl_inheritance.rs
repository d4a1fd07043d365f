//! Command: reconcile ACL inheritance on one path.
use anyhow::Result;

use super::Backends;
use crate::cli::{AclInheritanceOpts, GlobalOpts};
use crate::config::{AclInheritanceArgs, ModuleArgs};
use crate::error::ReconcileError;
use crate::logging::{Log, Logger};
use crate::reconcile::{self, ReconciliationResult};
use crate::resources::acl_inheritance::{AclInheritanceResource, AclPathHandle};

/// Run the `acl-inheritance` subcommand.
///
/// # Errors
///
/// Returns an error if the module failed.
pub fn run(global: &GlobalOpts, opts: AclInheritanceOpts, log: &Logger) -> Result<()> {
    let module = ModuleArgs::AclInheritance(opts.into());
    super::run_on_host(&[module], global.check, log)
}

/// Validate `args` and reconcile the path's inheritance flag.
///
/// # Errors
///
/// Returns [`ReconcileError::Validation`] before any system call if `args`
/// are invalid, or the collaborator's error.
pub fn reconcile(
    args: &AclInheritanceArgs,
    backends: &dyn Backends,
    check: bool,
    log: &dyn Log,
) -> Result<ReconciliationResult, ReconcileError> {
    let params = args.normalize()?;
    log.debug(&format!(
        "path={} state={} reorganize={}",
        params.path.display(),
        params.state,
        params.reorganize
    ));
    let handle = AclPathHandle::new(backends.acl_accessor()?, params.path.clone());
    let resource = AclInheritanceResource::new(params);
    reconcile::reconcile(&resource, &handle, check, log)
}
