//! BIG-IP remote syslog server resource.
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Map, Value};

use super::{Collaborator, Resource};
use crate::backends::bigip::SyslogDevice;
use crate::config::remote_syslog::DEFAULT_REMOTE_PORT;
use crate::config::{ApiRemoteServer, LocalIp, RemoteServer, RemoteSyslogParams, State};
use crate::error::{AmbiguousStateError, CollaboratorError, ReconcileError, ValidationError};

const SYSLOG_ENDPOINT: &str = "/mgmt/tm/sys/syslog";
const NAME_PREFIX: &str = "/Common/remotesyslog";

/// A remote syslog entry to be added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRemoteServer {
    /// Requested name; generated when `None`.
    pub name: Option<String>,
    /// Canonical remote host.
    pub remote_host: String,
    /// Remote port.
    pub remote_port: u16,
    /// Local source address.
    pub local_ip: LocalIp,
}

/// Change set for one remote syslog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyslogChanges {
    /// Add a new entry.
    Create(NewRemoteServer),
    /// Change attributes of an existing entry; `None` fields are left alone.
    Modify {
        /// Name of the entry to change.
        name: String,
        /// New port.
        remote_port: Option<u16>,
        /// New local IP.
        local_ip: Option<LocalIp>,
    },
    /// Delete an existing entry.
    Remove {
        /// Name of the entry to delete.
        name: String,
    },
}

impl fmt::Display for SyslogChanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create(new) => write!(
                f,
                "create {}:{} (local_ip {})",
                new.remote_host, new.remote_port, new.local_ip
            ),
            Self::Modify {
                name,
                remote_port,
                local_ip,
            } => {
                write!(f, "update {name}")?;
                if let Some(port) = remote_port {
                    write!(f, " remote_port={port}")?;
                }
                if let Some(ip) = local_ip {
                    write!(f, " local_ip={ip}")?;
                }
                Ok(())
            }
            Self::Remove { name } => write!(f, "remove {name}"),
        }
    }
}

/// Desired state of the remote syslog entry for one host.
#[derive(Debug, Clone)]
pub struct RemoteSyslogResource {
    params: RemoteSyslogParams,
}

impl RemoteSyslogResource {
    /// Create a resource from validated parameters.
    #[must_use]
    pub const fn new(params: RemoteSyslogParams) -> Self {
        Self { params }
    }

    /// The desired parameters.
    #[must_use]
    pub const fn params(&self) -> &RemoteSyslogParams {
        &self.params
    }

    fn base_report(&self, state: State) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(
            "remote_host".to_string(),
            Value::from(self.params.remote_host.clone()),
        );
        map.insert("state".to_string(), Value::from(state.to_string()));
        map
    }
}

impl Resource for RemoteSyslogResource {
    type Current = RemoteServer;
    type Changes = SyslogChanges;

    fn module(&self) -> &'static str {
        "remote_syslog"
    }

    fn description(&self) -> String {
        format!("remote syslog {}", self.params.remote_host)
    }

    fn plan_create(&self) -> Result<Option<SyslogChanges>, ReconcileError> {
        if self.params.state == State::Absent {
            return Ok(None);
        }
        Ok(Some(SyslogChanges::Create(NewRemoteServer {
            name: self.params.name.clone(),
            remote_host: self.params.remote_host.clone(),
            remote_port: self.params.remote_port.unwrap_or(DEFAULT_REMOTE_PORT),
            local_ip: self.params.local_ip.unwrap_or(LocalIp::None),
        })))
    }

    fn diff(&self, current: &RemoteServer) -> Option<SyslogChanges> {
        if self.params.state == State::Absent {
            return Some(SyslogChanges::Remove {
                name: current.name.clone(),
            });
        }
        let remote_port = self.params.remote_port.filter(|p| *p != current.remote_port);
        let local_ip = self.params.local_ip.filter(|ip| *ip != current.local_ip);
        if remote_port.is_none() && local_ip.is_none() {
            return None;
        }
        Some(SyslogChanges::Modify {
            name: current.name.clone(),
            remote_port,
            local_ip,
        })
    }

    fn report_changes(&self, changes: &SyslogChanges) -> Map<String, Value> {
        match changes {
            SyslogChanges::Create(new) => {
                let mut map = self.base_report(State::Present);
                map.insert("remote_port".to_string(), Value::from(new.remote_port));
                map.insert("local_ip".to_string(), Value::from(new.local_ip.to_string()));
                if let Some(name) = &new.name {
                    map.insert("name".to_string(), Value::from(name.clone()));
                }
                map
            }
            SyslogChanges::Modify {
                remote_port,
                local_ip,
                ..
            } => {
                let mut map = self.base_report(State::Present);
                if let Some(port) = remote_port {
                    map.insert("remote_port".to_string(), Value::from(*port));
                }
                if let Some(ip) = local_ip {
                    map.insert("local_ip".to_string(), Value::from(ip.to_string()));
                }
                map
            }
            SyslogChanges::Remove { .. } => self.base_report(State::Absent),
        }
    }

    fn report_unchanged(&self, current: Option<&RemoteServer>) -> Map<String, Value> {
        let Some(current) = current else {
            return self.base_report(State::Absent);
        };
        let mut map = self.base_report(State::Present);
        if self.params.remote_port.is_some() {
            map.insert("remote_port".to_string(), Value::from(current.remote_port));
        }
        if self.params.local_ip.is_some() {
            map.insert(
                "local_ip".to_string(),
                Value::from(current.local_ip.to_string()),
            );
        }
        map
    }
}

/// [`Collaborator`] for the remote syslog entry of one host on one device.
///
/// The loaded server list is memoized until the next write, so an existence
/// check followed by a read costs one request. Writes send every other entry
/// back exactly as the device reported it.
#[derive(Debug)]
pub struct SyslogServerHandle {
    device: Arc<dyn SyslogDevice>,
    remote_host: String,
    new_name: Option<String>,
    cache: Mutex<Option<Loaded>>,
}

/// Device records as loaded, next to their normalized form.
#[derive(Debug, Clone)]
struct Loaded {
    raw: Vec<ApiRemoteServer>,
    servers: Vec<RemoteServer>,
}

impl SyslogServerHandle {
    /// Create a handle for the entry whose host is `remote_host` (canonical).
    #[must_use]
    pub fn new(device: Arc<dyn SyslogDevice>, remote_host: &str) -> Self {
        Self {
            device,
            remote_host: remote_host.to_string(),
            new_name: None,
            cache: Mutex::new(None),
        }
    }

    /// Name a newly created entry will take.
    ///
    /// When the host has no entry yet, the existence check fails if another
    /// entry already uses this name.
    #[must_use]
    pub fn with_new_name(mut self, name: Option<String>) -> Self {
        self.new_name = name;
        self
    }

    fn load(&self) -> Result<Loaded, ReconcileError> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(loaded) = cache.as_ref() {
            return Ok(loaded.clone());
        }
        let syslog = self.device.load_syslog()?;
        let servers = syslog
            .remote_servers()
            .map_err(|message| CollaboratorError::InvalidResponse {
                target: SYSLOG_ENDPOINT.to_string(),
                message,
            })?;
        let loaded = Loaded {
            raw: syslog.remote_servers,
            servers,
        };
        *cache = Some(loaded.clone());
        Ok(loaded)
    }

    fn matching(&self) -> Result<Option<RemoteServer>, ReconcileError> {
        let mut matches: Vec<RemoteServer> = self
            .load()?
            .servers
            .into_iter()
            .filter(|s| s.remote_host == self.remote_host)
            .collect();
        if matches.len() > 1 {
            return Err(AmbiguousStateError {
                key: self.remote_host.clone(),
                count: matches.len(),
            }
            .into());
        }
        Ok(matches.pop())
    }

    fn write(&self, changes: &SyslogChanges) -> Result<(), ReconcileError> {
        let Loaded { mut raw, servers } = self.load()?;
        match changes {
            SyslogChanges::Create(new) => {
                let name = match &new.name {
                    Some(name) => {
                        ensure_name_free(name, &servers)?;
                        name.clone()
                    }
                    None => next_free_name(&servers),
                };
                raw.push(
                    RemoteServer {
                        name,
                        remote_host: new.remote_host.clone(),
                        remote_port: new.remote_port,
                        local_ip: new.local_ip,
                    }
                    .to_api(),
                );
            }
            SyslogChanges::Modify {
                name,
                remote_port,
                local_ip,
            } => {
                let entry = raw
                    .iter_mut()
                    .find(|s| &s.name == name)
                    .ok_or_else(|| CollaboratorError::NotFound(name.clone()))?;
                if let Some(port) = remote_port {
                    entry.remote_port = Some(*port);
                }
                if let Some(ip) = local_ip {
                    entry.local_ip = Some(ip.to_string());
                }
            }
            SyslogChanges::Remove { name } => raw.retain(|s| &s.name != name),
        }

        let result = self.device.modify_remote_servers(&raw);
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = None;
        result.map_err(ReconcileError::from)
    }
}

impl Collaborator for SyslogServerHandle {
    type Current = RemoteServer;
    type Changes = SyslogChanges;

    fn exists(&self) -> Result<bool, ReconcileError> {
        let found = self.matching()?.is_some();
        if !found && let Some(name) = &self.new_name {
            ensure_name_free(name, &self.load()?.servers)?;
        }
        Ok(found)
    }

    fn read_current(&self) -> Result<RemoteServer, ReconcileError> {
        self.matching()?.ok_or_else(|| {
            CollaboratorError::NotFound(format!("remote syslog server {}", self.remote_host)).into()
        })
    }

    fn create(&self, changes: &SyslogChanges) -> Result<(), ReconcileError> {
        self.write(changes)
    }

    fn update(&self, changes: &SyslogChanges) -> Result<(), ReconcileError> {
        self.write(changes)
    }
}

fn ensure_name_free(name: &str, servers: &[RemoteServer]) -> Result<(), ValidationError> {
    if servers.iter().any(|s| s.name == name) {
        return Err(ValidationError::InvalidValue {
            param: "name",
            reason: format!("{name} is already used by another remote server"),
        });
    }
    Ok(())
}

/// `/Common/remotesyslog<N>` with the smallest unused `N`.
fn next_free_name(servers: &[RemoteServer]) -> String {
    let mut n = 1_usize;
    loop {
        let candidate = format!("{NAME_PREFIX}{n}");
        if !servers.iter().any(|s| s.name == candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::backends::bigip::MockSyslogDevice;
    use crate::config::ApiSyslog;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn api_server(name: &str, host: &str, port: u16, local_ip: &str) -> ApiRemoteServer {
        ApiRemoteServer {
            name: name.to_string(),
            host: host.to_string(),
            remote_port: Some(port),
            local_ip: Some(local_ip.to_string()),
        }
    }

    fn syslog(servers: Vec<ApiRemoteServer>) -> ApiSyslog {
        ApiSyslog {
            remote_servers: servers,
        }
    }

    fn params(remote_port: Option<u16>, local_ip: Option<&str>) -> RemoteSyslogParams {
        RemoteSyslogParams {
            remote_host: "10.10.10.10".to_string(),
            remote_port,
            local_ip: local_ip.map(|ip| ip.parse().unwrap()),
            name: None,
            state: State::Present,
        }
    }

    fn current(port: u16, local_ip: LocalIp) -> RemoteServer {
        RemoteServer {
            name: "/Common/remotesyslog1".to_string(),
            remote_host: "10.10.10.10".to_string(),
            remote_port: port,
            local_ip,
        }
    }

    #[test]
    fn equal_parameters_have_no_changes() {
        let resource = RemoteSyslogResource::new(params(Some(514), None));
        assert_eq!(resource.diff(&current(514, LocalIp::None)), None);
    }

    #[test]
    fn port_difference_is_the_only_change() {
        let resource = RemoteSyslogResource::new(params(Some(800), None));
        let changes = resource.diff(&current(514, LocalIp::None)).unwrap();
        assert_eq!(
            changes,
            SyslogChanges::Modify {
                name: "/Common/remotesyslog1".to_string(),
                remote_port: Some(800),
                local_ip: None,
            }
        );
        let report = resource.report_changes(&changes);
        assert_eq!(report["remote_port"], 800);
        assert!(report.get("local_ip").is_none());
    }

    #[test]
    fn local_ip_difference_is_reported() {
        let resource = RemoteSyslogResource::new(params(None, Some("2.2.2.2")));
        let changes = resource.diff(&current(514, LocalIp::None)).unwrap();
        assert_eq!(resource.report_changes(&changes)["local_ip"], "2.2.2.2");
    }

    #[test]
    fn unsupplied_attributes_are_left_alone() {
        let resource = RemoteSyslogResource::new(params(None, None));
        let live = current(800, LocalIp::Addr("2.2.2.2".parse().unwrap()));
        assert_eq!(resource.diff(&live), None);
        let report = resource.report_unchanged(Some(&live));
        assert!(report.get("remote_port").is_none());
        assert_eq!(report["remote_host"], "10.10.10.10");
    }

    #[test]
    fn unchanged_report_echoes_current_values() {
        let resource = RemoteSyslogResource::new(params(Some(514), Some("none")));
        let report = resource.report_unchanged(Some(&current(514, LocalIp::None)));
        assert_eq!(report["remote_port"], 514);
        assert_eq!(report["local_ip"], "none");
    }

    #[test]
    fn create_fills_defaults() {
        let resource = RemoteSyslogResource::new(params(None, None));
        let Some(SyslogChanges::Create(new)) = resource.plan_create().unwrap() else {
            panic!("expected a create");
        };
        assert_eq!(new.remote_port, 514);
        assert_eq!(new.local_ip, LocalIp::None);
        assert_eq!(new.name, None);
    }

    #[test]
    fn absent_plans_removal_or_nothing() {
        let resource = RemoteSyslogResource::new(RemoteSyslogParams {
            state: State::Absent,
            ..params(None, None)
        });
        assert!(resource.plan_create().unwrap().is_none());
        assert_eq!(
            resource.diff(&current(514, LocalIp::None)),
            Some(SyslogChanges::Remove {
                name: "/Common/remotesyslog1".to_string()
            })
        );
    }

    #[test]
    fn next_free_name_fills_gaps() {
        let servers = vec![
            current(514, LocalIp::None),
            RemoteServer {
                name: "/Common/remotesyslog3".to_string(),
                ..current(514, LocalIp::None)
            },
        ];
        assert_eq!(next_free_name(&servers), "/Common/remotesyslog2");
        assert_eq!(next_free_name(&[]), "/Common/remotesyslog1");
    }

    #[test]
    fn exists_then_read_loads_once() {
        let mut device = MockSyslogDevice::new();
        device.expect_load_syslog().times(1).returning(|| {
            Ok(syslog(vec![api_server(
                "/Common/remotesyslog1",
                "10.10.10.10",
                514,
                "none",
            )]))
        });
        let handle = SyslogServerHandle::new(Arc::new(device), "10.10.10.10");
        assert!(handle.exists().unwrap());
        assert_eq!(handle.read_current().unwrap().remote_port, 514);
    }

    #[test]
    fn duplicate_hosts_are_ambiguous() {
        let mut device = MockSyslogDevice::new();
        device.expect_load_syslog().returning(|| {
            Ok(syslog(vec![
                api_server("/Common/a", "10.10.10.10", 514, "none"),
                api_server("/Common/b", "10.10.10.10", 515, "none"),
            ]))
        });
        let handle = SyslogServerHandle::new(Arc::new(device), "10.10.10.10");
        let err = handle.exists().unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::Ambiguous(AmbiguousStateError { count: 2, .. })
        ));
    }

    #[test]
    fn malformed_entry_is_collaborator_error() {
        let mut device = MockSyslogDevice::new();
        device
            .expect_load_syslog()
            .returning(|| Ok(syslog(vec![api_server("/Common/a", "10.0.0.1", 514, "x.y")])));
        let handle = SyslogServerHandle::new(Arc::new(device), "10.10.10.10");
        assert!(matches!(
            handle.exists().unwrap_err(),
            ReconcileError::Collaborator(CollaboratorError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn create_appends_generated_name_and_reloads() {
        let loads = AtomicUsize::new(0);
        let mut device = MockSyslogDevice::new();
        device.expect_load_syslog().times(2).returning(move || {
            let mut servers = vec![api_server("/Common/remotesyslog1", "192.0.2.1", 514, "none")];
            if loads.fetch_add(1, Ordering::SeqCst) > 0 {
                servers.push(api_server("/Common/remotesyslog2", "10.10.10.10", 514, "none"));
            }
            Ok(syslog(servers))
        });
        device
            .expect_modify_remote_servers()
            .withf(|servers| {
                servers.len() == 2
                    && servers[1].name == "/Common/remotesyslog2"
                    && servers[1].host == "10.10.10.10"
            })
            .times(1)
            .returning(|_| Ok(()));

        let handle = SyslogServerHandle::new(Arc::new(device), "10.10.10.10");
        assert!(!handle.exists().unwrap());
        let resource = RemoteSyslogResource::new(params(None, None));
        handle.create(&resource.plan_create().unwrap().unwrap()).unwrap();
        assert!(handle.exists().unwrap());
    }

    #[test]
    fn create_with_taken_name_is_rejected_before_writing() {
        let mut device = MockSyslogDevice::new();
        device.expect_load_syslog().returning(|| {
            Ok(syslog(vec![api_server("/Common/collector", "192.0.2.1", 514, "none")]))
        });
        device.expect_modify_remote_servers().never();
        let handle = SyslogServerHandle::new(Arc::new(device), "10.10.10.10");
        let changes = SyslogChanges::Create(NewRemoteServer {
            name: Some("/Common/collector".to_string()),
            remote_host: "10.10.10.10".to_string(),
            remote_port: 514,
            local_ip: LocalIp::None,
        });
        assert!(matches!(
            handle.create(&changes).unwrap_err(),
            ReconcileError::Validation(ValidationError::InvalidValue { param: "name", .. })
        ));
    }

    #[test]
    fn remove_drops_only_the_named_entry() {
        let mut device = MockSyslogDevice::new();
        device.expect_load_syslog().returning(|| {
            Ok(syslog(vec![
                api_server("/Common/remotesyslog1", "10.10.10.10", 514, "none"),
                api_server("/Common/remotesyslog2", "192.0.2.1", 514, "none"),
            ]))
        });
        device
            .expect_modify_remote_servers()
            .withf(|servers| servers.len() == 1 && servers[0].name == "/Common/remotesyslog2")
            .times(1)
            .returning(|_| Ok(()));
        let handle = SyslogServerHandle::new(Arc::new(device), "10.10.10.10");
        handle
            .update(&SyslogChanges::Remove {
                name: "/Common/remotesyslog1".to_string(),
            })
            .unwrap();
    }

    #[test]
    fn write_failure_is_surfaced() {
        let mut device = MockSyslogDevice::new();
        device.expect_load_syslog().returning(|| {
            Ok(syslog(vec![api_server("/Common/remotesyslog1", "10.10.10.10", 514, "none")]))
        });
        device.expect_modify_remote_servers().returning(|_| {
            Err(CollaboratorError::Status {
                target: SYSLOG_ENDPOINT.to_string(),
                status: 401,
            })
        });
        let handle = SyslogServerHandle::new(Arc::new(device), "10.10.10.10");
        let err = handle
            .update(&SyslogChanges::Modify {
                name: "/Common/remotesyslog1".to_string(),
                remote_port: Some(800),
                local_ip: None,
            })
            .unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn modify_sends_other_entries_back_as_loaded() {
        let other = ApiRemoteServer {
            name: "/Common/other".to_string(),
            host: "LOGS.Example.COM".to_string(),
            remote_port: None,
            local_ip: None,
        };
        let loaded = other.clone();
        let mut device = MockSyslogDevice::new();
        device.expect_load_syslog().returning(move || {
            Ok(syslog(vec![
                loaded.clone(),
                api_server("/Common/remotesyslog1", "10.10.10.10", 514, "none"),
            ]))
        });
        device
            .expect_modify_remote_servers()
            .withf(move |servers| {
                servers.len() == 2
                    && servers[0] == other
                    && servers[1].remote_port == Some(800)
                    && servers[1].local_ip.as_deref() == Some("none")
            })
            .times(1)
            .returning(|_| Ok(()));
        let handle = SyslogServerHandle::new(Arc::new(device), "10.10.10.10");
        handle
            .update(&SyslogChanges::Modify {
                name: "/Common/remotesyslog1".to_string(),
                remote_port: Some(800),
                local_ip: None,
            })
            .unwrap();
    }

    #[test]
    fn taken_new_name_fails_the_existence_check() {
        let mut device = MockSyslogDevice::new();
        device.expect_load_syslog().returning(|| {
            Ok(syslog(vec![api_server("/Common/collector", "192.0.2.1", 514, "none")]))
        });
        let device = Arc::new(device);

        let handle = SyslogServerHandle::new(device.clone(), "10.10.10.10")
            .with_new_name(Some("/Common/collector".to_string()));
        assert!(matches!(
            handle.exists().unwrap_err(),
            ReconcileError::Validation(ValidationError::InvalidValue { param: "name", .. })
        ));

        let handle = SyslogServerHandle::new(device, "192.0.2.1")
            .with_new_name(Some("/Common/collector".to_string()));
        assert!(handle.exists().unwrap());
    }
}
