//! Command: reconcile one BIG-IP remote syslog server.
use anyhow::Result;

use super::Backends;
use crate::cli::{GlobalOpts, RemoteSyslogOpts};
use crate::config::{ModuleArgs, RemoteSyslogArgs, State};
use crate::error::ReconcileError;
use crate::logging::{Log, Logger};
use crate::reconcile::{self, ReconciliationResult};
use crate::resources::remote_syslog::{RemoteSyslogResource, SyslogServerHandle};

/// Run the `remote-syslog` subcommand.
///
/// # Errors
///
/// Returns an error if the module failed.
pub fn run(global: &GlobalOpts, opts: RemoteSyslogOpts, log: &Logger) -> Result<()> {
    let module = ModuleArgs::RemoteSyslog(opts.into());
    super::run_on_host(&[module], global.check, log)
}

/// Validate `args`, connect, and reconcile the entry for `remote_host`.
///
/// # Errors
///
/// Returns [`ReconcileError::Validation`] before any request if `args` are
/// invalid, or the device's error.
pub fn reconcile(
    args: &RemoteSyslogArgs,
    backends: &dyn Backends,
    check: bool,
    log: &dyn Log,
) -> Result<ReconciliationResult, ReconcileError> {
    let params = args.normalize()?;
    let conn = args.connection()?;
    log.debug(&format!(
        "device {}:{} (validate_certs={})",
        conn.server, conn.server_port, conn.validate_certs
    ));

    let new_name = params
        .name
        .clone()
        .filter(|_| params.state == State::Present);
    let handle = SyslogServerHandle::new(backends.syslog_device(&conn), &params.remote_host)
        .with_new_name(new_name);
    let resource = RemoteSyslogResource::new(params);
    reconcile::reconcile(&resource, &handle, check, log)
}
