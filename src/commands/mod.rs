//! Top-level subcommand orchestration.
//!
//! Every module invocation, whether it comes from subcommand flags or from a
//! TOML argument file, goes through [`run_modules`]: validate, build the
//! collaborator, reconcile, print one JSON result line, record the outcome.
pub mod acl_inheritance;
pub mod remote_syslog;
pub mod run;
pub mod version;

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use serde_json::json;

use crate::backends::bigip::{BigIpClient, SyslogDevice};
use crate::backends::windows_acl::{AclAccessor, PowerShellAcl};
use crate::config::{ConnectionParams, ModuleArgs};
use crate::error::{CollaboratorError, ReconcileError};
use crate::exec::SystemExecutor;
use crate::logging::{Log, Logger, ModuleStatus};
use crate::platform::Platform;
use crate::reconcile::ReconciliationResult;

/// Factory for the collaborators a module talks to.
///
/// Called only after a module's arguments have validated, so invalid input
/// never opens a connection or spawns a process.
pub trait Backends {
    /// The filesystem ACL accessor.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError`] if ACLs are unavailable on this host.
    fn acl_accessor(&self) -> Result<Arc<dyn AclAccessor>, CollaboratorError>;

    /// A client for the device described by `conn`.
    fn syslog_device(&self, conn: &ConnectionParams) -> Arc<dyn SyslogDevice>;
}

/// Production [`Backends`]: `PowerShell` for ACLs, HTTPS for BIG-IP.
#[derive(Debug, Clone, Copy)]
pub struct SystemBackends {
    platform: Platform,
}

impl SystemBackends {
    /// Backends for the current host.
    #[must_use]
    pub const fn detect() -> Self {
        Self {
            platform: Platform::detect(),
        }
    }
}

impl Backends for SystemBackends {
    fn acl_accessor(&self) -> Result<Arc<dyn AclAccessor>, CollaboratorError> {
        self.platform.require_windows("filesystem ACL management")?;
        Ok(Arc::new(PowerShellAcl::new(Arc::new(SystemExecutor))))
    }

    fn syslog_device(&self, conn: &ConnectionParams) -> Arc<dyn SyslogDevice> {
        Arc::new(BigIpClient::new(conn))
    }
}

/// Summary label for a module invocation, e.g. `remote_syslog 10.10.10.10`.
fn label(module: &ModuleArgs) -> String {
    let target = match module {
        ModuleArgs::AclInheritance(args) => args.path.as_deref(),
        ModuleArgs::RemoteSyslog(args) => args.remote_host.as_deref(),
    };
    format!("{} {}", module.name(), target.unwrap_or("<missing>"))
}

fn run_module(
    module: &ModuleArgs,
    backends: &dyn Backends,
    check: bool,
    log: &dyn Log,
) -> Result<ReconciliationResult, ReconcileError> {
    match module {
        ModuleArgs::AclInheritance(args) => acl_inheritance::reconcile(args, backends, check, log),
        ModuleArgs::RemoteSyslog(args) => remote_syslog::reconcile(args, backends, check, log),
    }
}

/// Run every module in order, writing one JSON line per module to `out`,
/// then print the summary.
///
/// A failing module does not stop the ones after it.
///
/// # Errors
///
/// Returns an error if writing to `out` fails or any module failed.
pub fn run_modules(
    modules: &[ModuleArgs],
    backends: &dyn Backends,
    check: bool,
    log: &Logger,
    out: &mut dyn Write,
) -> Result<()> {
    for module in modules {
        let label = label(module);
        log.stage(&label);

        let line = match run_module(module, backends, check, log) {
            Ok(result) => {
                let status = match (result.changed, check) {
                    (false, _) => ModuleStatus::Ok,
                    (true, false) => ModuleStatus::Changed,
                    (true, true) => ModuleStatus::DryRun,
                };
                log.record_module(&label, status, None);
                result.to_json()?
            }
            Err(e) => {
                log.error(&format!("{label}: {e}"));
                log.record_module(&label, ModuleStatus::Failed, Some(&e.to_string()));
                json!({
                    "module": module.name(),
                    "changed": false,
                    "failed": true,
                    "msg": e.to_string(),
                })
                .to_string()
            }
        };
        writeln!(out, "{line}").context("failed to write result")?;
    }

    log.print_summary();

    let count = log.failure_count();
    if count > 0 {
        anyhow::bail!("{count} module(s) failed");
    }
    Ok(())
}

/// Run `modules` against the real backends, printing results to stdout.
///
/// # Errors
///
/// Returns an error if any module failed.
pub fn run_on_host(modules: &[ModuleArgs], check: bool, log: &Logger) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_modules(modules, &SystemBackends::detect(), check, log, &mut out)
}
