// Shared helpers for integration tests.
//
// Provides in-memory stand-ins for the BIG-IP device and the filesystem ACL
// accessor, a `Backends` that hands them out, a recording `Log`, and the
// recorded device fixture.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use reconcile_cli::backends::bigip::SyslogDevice;
use reconcile_cli::backends::windows_acl::{
    AccessRule, AclAccessor, AclSnapshot, InheritanceChange,
};
use reconcile_cli::commands::Backends;
use reconcile_cli::config::{
    ApiRemoteServer, ApiSyslog, ConnectionParams, RemoteSyslogArgs,
};
use reconcile_cli::error::CollaboratorError;
use reconcile_cli::logging::{Log, ModuleStatus};

/// Read `tests/fixtures/<name>`.
pub fn load_fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(&path).expect("read fixture")
}

/// The recorded `GET /mgmt/tm/sys/syslog` response, parsed.
pub fn syslog_fixture() -> ApiSyslog {
    serde_json::from_str(&load_fixture("load_tm_sys_syslog.json")).expect("parse fixture")
}

/// Remote syslog arguments with connection settings filled in.
pub fn syslog_args(remote_host: &str) -> RemoteSyslogArgs {
    RemoteSyslogArgs {
        remote_host: Some(remote_host.to_string()),
        server: Some("localhost".to_string()),
        user: Some("admin".to_string()),
        password: Some("password".to_string()),
        ..RemoteSyslogArgs::default()
    }
}

/// An in-memory BIG-IP that applies `modify_remote_servers` to its state.
#[derive(Debug, Default)]
pub struct FakeDevice {
    servers: Mutex<Vec<ApiRemoteServer>>,
    loads: Mutex<usize>,
    writes: Mutex<Vec<Vec<ApiRemoteServer>>>,
    drop_writes: bool,
}

impl FakeDevice {
    /// A device holding `syslog`'s remote servers.
    pub fn with(syslog: ApiSyslog) -> Self {
        Self {
            servers: Mutex::new(syslog.remote_servers),
            ..Self::default()
        }
    }

    /// A device that accepts writes but never persists them.
    pub fn dropping_writes(syslog: ApiSyslog) -> Self {
        Self {
            drop_writes: true,
            ..Self::with(syslog)
        }
    }

    /// Number of GET requests served.
    pub fn loads(&self) -> usize {
        *self.loads.lock().unwrap()
    }

    /// Every `remoteServers` list written, in order.
    pub fn writes(&self) -> Vec<Vec<ApiRemoteServer>> {
        self.writes.lock().unwrap().clone()
    }

    /// Current device state.
    pub fn servers(&self) -> Vec<ApiRemoteServer> {
        self.servers.lock().unwrap().clone()
    }
}

impl SyslogDevice for FakeDevice {
    fn load_syslog(&self) -> Result<ApiSyslog, CollaboratorError> {
        *self.loads.lock().unwrap() += 1;
        Ok(ApiSyslog {
            remote_servers: self.servers(),
        })
    }

    fn modify_remote_servers(&self, servers: &[ApiRemoteServer]) -> Result<(), CollaboratorError> {
        self.writes.lock().unwrap().push(servers.to_vec());
        if !self.drop_writes {
            *self.servers.lock().unwrap() = servers.to_vec();
        }
        Ok(())
    }
}

/// A device whose every request fails with an HTTP status.
#[derive(Debug)]
pub struct FailingDevice(pub u16);

impl SyslogDevice for FailingDevice {
    fn load_syslog(&self) -> Result<ApiSyslog, CollaboratorError> {
        Err(CollaboratorError::Status {
            target: "https://localhost:443/mgmt/tm/sys/syslog".to_string(),
            status: self.0,
        })
    }

    fn modify_remote_servers(&self, _: &[ApiRemoteServer]) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::Status {
            target: "https://localhost:443/mgmt/tm/sys/syslog".to_string(),
            status: self.0,
        })
    }
}

/// Build an access rule.
pub fn rule(identity: &str, rights: &str, inherited: bool) -> AccessRule {
    AccessRule {
        identity: identity.to_string(),
        rights: rights.to_string(),
        access_type: "Allow".to_string(),
        inheritance_flags: "ContainerInherit, ObjectInherit".to_string(),
        propagation_flags: "None".to_string(),
        inherited,
    }
}

/// An explicit copy of `rule`.
pub fn explicit_copy(rule: &AccessRule) -> AccessRule {
    AccessRule {
        inherited: false,
        ..rule.clone()
    }
}

/// The ACL Windows leaves behind after `change`, given the rules the parent
/// passes down.
///
/// Disabling drops inherited rules, first copying them as explicit rules when
/// `copy_inherited` is set. Enabling adds the parent's rules as inherited and,
/// when `prune_duplicates` is set, removes the explicit rules that
/// `explicit_duplicates` reports.
pub fn transition(
    current: &AclSnapshot,
    change: InheritanceChange,
    parent_rules: &[AccessRule],
) -> AclSnapshot {
    match change {
        InheritanceChange::Disable { copy_inherited } => {
            let mut rules: Vec<AccessRule> = current.explicit().cloned().collect();
            if copy_inherited {
                for rule in current.inherited().map(explicit_copy) {
                    if !rules.iter().any(|r| r.same_grant(&rule)) {
                        rules.push(rule);
                    }
                }
            }
            AclSnapshot {
                inheritance_enabled: false,
                rules,
            }
        }
        InheritanceChange::Enable { prune_duplicates } => {
            let mut enabled = AclSnapshot {
                inheritance_enabled: true,
                rules: current
                    .explicit()
                    .cloned()
                    .chain(parent_rules.iter().map(|r| AccessRule {
                        inherited: true,
                        ..r.clone()
                    }))
                    .collect(),
            };
            if prune_duplicates {
                let duplicates: Vec<AccessRule> =
                    enabled.explicit_duplicates().into_iter().cloned().collect();
                enabled
                    .rules
                    .retain(|r| r.inherited || !duplicates.contains(r));
            }
            enabled
        }
    }
}

/// An in-memory filesystem of ACLs that share one parent.
#[derive(Debug, Default)]
pub struct FakeAcl {
    acls: Mutex<HashMap<PathBuf, AclSnapshot>>,
    parent_rules: Vec<AccessRule>,
    applied: Mutex<Vec<InheritanceChange>>,
}

impl FakeAcl {
    /// An accessor whose paths inherit `parent_rules` when inheritance is on.
    pub fn with_parent(parent_rules: Vec<AccessRule>) -> Self {
        Self {
            parent_rules,
            ..Self::default()
        }
    }

    /// Add `path` with `snapshot`.
    pub fn insert(&self, path: &str, snapshot: AclSnapshot) {
        self.acls
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), snapshot);
    }

    /// Current ACL of `path`.
    pub fn snapshot(&self, path: &str) -> AclSnapshot {
        self.acls.lock().unwrap()[Path::new(path)].clone()
    }

    /// Every change applied, in order.
    pub fn applied(&self) -> Vec<InheritanceChange> {
        self.applied.lock().unwrap().clone()
    }
}

impl AclAccessor for FakeAcl {
    fn exists(&self, path: &Path) -> Result<bool, CollaboratorError> {
        Ok(self.acls.lock().unwrap().contains_key(path))
    }

    fn read(&self, path: &Path) -> Result<AclSnapshot, CollaboratorError> {
        self.acls
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound(path.display().to_string()))
    }

    fn apply(&self, path: &Path, change: InheritanceChange) -> Result<(), CollaboratorError> {
        self.applied.lock().unwrap().push(change);
        let mut acls = self.acls.lock().unwrap();
        let current = acls
            .get(path)
            .ok_or_else(|| CollaboratorError::NotFound(path.display().to_string()))?;
        let next = transition(current, change, &self.parent_rules);
        acls.insert(path.to_path_buf(), next);
        Ok(())
    }
}

/// [`Backends`] handing out the fakes above.
#[derive(Debug)]
pub struct FakeBackends {
    pub acl: Option<Arc<dyn AclAccessor>>,
    pub device: Arc<dyn SyslogDevice>,
    pub connections: Mutex<Vec<ConnectionParams>>,
}

impl FakeBackends {
    /// Backends with a device and no ACL support.
    pub fn device(device: Arc<dyn SyslogDevice>) -> Self {
        Self {
            acl: None,
            device,
            connections: Mutex::new(Vec::new()),
        }
    }

    /// Backends with an ACL accessor and an empty device.
    pub fn acl(acl: Arc<dyn AclAccessor>) -> Self {
        Self {
            acl: Some(acl),
            ..Self::device(Arc::new(FakeDevice::default()))
        }
    }

    /// Number of device connections opened.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }
}

impl Backends for FakeBackends {
    fn acl_accessor(&self) -> Result<Arc<dyn AclAccessor>, CollaboratorError> {
        self.acl.clone().ok_or_else(|| CollaboratorError::Unsupported {
            what: "filesystem ACL management".to_string(),
            platform: "test".to_string(),
        })
    }

    fn syslog_device(&self, conn: &ConnectionParams) -> Arc<dyn SyslogDevice> {
        self.connections.lock().unwrap().push(conn.clone());
        Arc::clone(&self.device)
    }
}

/// A [`Log`] that keeps every message.
#[derive(Debug, Default)]
pub struct RecordingLog {
    messages: Mutex<Vec<(&'static str, String)>>,
}

impl RecordingLog {
    /// Messages logged at `level` (`"dry_run"`, `"info"`, ...).
    pub fn messages(&self, level: &str) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    fn push(&self, level: &'static str, msg: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((level, msg.to_string()));
    }
}

impl Log for RecordingLog {
    fn stage(&self, msg: &str) {
        self.push("stage", msg);
    }

    fn info(&self, msg: &str) {
        self.push("info", msg);
    }

    fn debug(&self, msg: &str) {
        self.push("debug", msg);
    }

    fn warn(&self, msg: &str) {
        self.push("warn", msg);
    }

    fn error(&self, msg: &str) {
        self.push("error", msg);
    }

    fn dry_run(&self, msg: &str) {
        self.push("dry_run", msg);
    }

    fn record_module(&self, name: &str, status: ModuleStatus, _message: Option<&str>) {
        self.push("module", &format!("{name} {status:?}"));
    }
}
