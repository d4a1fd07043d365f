//! Remote syslog arguments and normalization of device records.
//!
//! User arguments (`remote_host`, `remote_port`, `local_ip`) and BIG-IP API
//! records (`host`, `remotePort`, `localIp`) name the same concepts
//! differently.  Both normalize into the same canonical types here so the
//! differ can compare them field by field.
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{State, required};
use crate::error::ValidationError;

/// Port used by BIG-IP when a remote server has no explicit `remotePort`.
pub const DEFAULT_REMOTE_PORT: u16 = 514;

/// Default iControl REST port.
pub const DEFAULT_SERVER_PORT: u16 = 443;

/// Default HTTP timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Raw remote syslog arguments as supplied by the user.
///
/// The connection keys (`server`, `server_port`, `user`, `password`,
/// `validate_certs`, `timeout`) are consumed by the device client, not by the
/// reconciliation itself.
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteSyslogArgs {
    /// Syslog server address (IP or hostname).
    pub remote_host: Option<String>,
    /// Syslog server port.
    pub remote_port: Option<i64>,
    /// Local IP the device sends from, or `none`.
    pub local_ip: Option<String>,
    /// Entry name, only used when a new entry is created.
    pub name: Option<String>,
    /// `present` or `absent`.
    pub state: Option<State>,
    /// BIG-IP management host.
    pub server: Option<String>,
    /// BIG-IP management port.
    pub server_port: Option<i64>,
    /// Management user.
    pub user: Option<String>,
    /// Management password.
    pub password: Option<String>,
    /// Verify the device TLS certificate.
    pub validate_certs: Option<bool>,
    /// HTTP timeout in seconds.
    pub timeout: Option<u64>,
}

impl fmt::Debug for RemoteSyslogArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSyslogArgs")
            .field("remote_host", &self.remote_host)
            .field("remote_port", &self.remote_port)
            .field("local_ip", &self.local_ip)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("server", &self.server)
            .field("server_port", &self.server_port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .field("validate_certs", &self.validate_certs)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Local source address of a remote syslog entry.
///
/// BIG-IP reports "no local IP" as the literal string `none`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalIp {
    /// No local address configured.
    None,
    /// A specific local address.
    Addr(IpAddr),
}

impl FromStr for LocalIp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("none") {
            return Ok(Self::None);
        }
        s.parse::<IpAddr>()
            .map(Self::Addr)
            .map_err(|_| format!("'{s}' is not a valid IP address"))
    }
}

impl fmt::Display for LocalIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Addr(ip) => write!(f, "{ip}"),
        }
    }
}

/// Desired remote syslog parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSyslogParams {
    /// Canonical remote host; the identifying key.
    pub remote_host: String,
    /// Desired port; `None` leaves the current port alone.
    pub remote_port: Option<u16>,
    /// Desired local IP; `None` leaves the current value alone.
    pub local_ip: Option<LocalIp>,
    /// Fully qualified name for a new entry.
    pub name: Option<String>,
    /// Whether the entry should exist.
    pub state: State,
}

/// Connection settings for the BIG-IP management API.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Management host.
    pub server: String,
    /// Management port.
    pub server_port: u16,
    /// Management user.
    pub user: String,
    /// Management password.
    pub password: String,
    /// Verify the device TLS certificate.
    pub validate_certs: bool,
    /// Global HTTP timeout.
    pub timeout: Duration,
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("server", &self.server)
            .field("server_port", &self.server_port)
            .field("user", &self.user)
            .field("password", &"********")
            .field("validate_certs", &self.validate_certs)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RemoteSyslogArgs {
    /// Validate and normalize the reconciliation parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if `remote_host` is missing, the port is
    /// out of range, `local_ip` is not an address or `none`, or `name` is blank.
    pub fn normalize(&self) -> Result<RemoteSyslogParams, ValidationError> {
        let remote_host = canonical_host(&required("remote_host", self.remote_host.as_deref())?)
            .map_err(|reason| ValidationError::InvalidValue {
                param: "remote_host",
                reason,
            })?;

        let remote_port = self
            .remote_port
            .map(|p| port("remote_port", p))
            .transpose()?;

        let local_ip = self
            .local_ip
            .as_deref()
            .map(|s| {
                s.parse::<LocalIp>()
                    .map_err(|reason| ValidationError::InvalidValue {
                        param: "local_ip",
                        reason,
                    })
            })
            .transpose()?;

        let name = self
            .name
            .as_deref()
            .map(|n| required("name", Some(n)).map(|n| qualify_name(&n)))
            .transpose()?;

        Ok(RemoteSyslogParams {
            remote_host,
            remote_port,
            local_ip,
            name,
            state: self.state.unwrap_or(State::Present),
        })
    }

    /// Validate the connection settings.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if `server`, `user` or `password` is
    /// missing, `server_port` is out of range, or `timeout` is zero.
    pub fn connection(&self) -> Result<ConnectionParams, ValidationError> {
        let password = self
            .password
            .clone()
            .filter(|p| !p.is_empty())
            .ok_or(ValidationError::Missing("password"))?;

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout == 0 {
            return Err(ValidationError::InvalidValue {
                param: "timeout",
                reason: "must be at least 1 second".to_string(),
            });
        }

        Ok(ConnectionParams {
            server: required("server", self.server.as_deref())?,
            server_port: self
                .server_port
                .map_or(Ok(DEFAULT_SERVER_PORT), |p| port("server_port", p))?,
            user: required("user", self.user.as_deref())?,
            password,
            validate_certs: self.validate_certs.unwrap_or(true),
            timeout: Duration::from_secs(timeout),
        })
    }
}

/// A remote syslog entry as configured on the device, normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteServer {
    /// Fully qualified entry name, e.g. `/Common/remotesyslog1`.
    pub name: String,
    /// Canonical remote host.
    pub remote_host: String,
    /// Remote port.
    pub remote_port: u16,
    /// Local source address.
    pub local_ip: LocalIp,
}

/// One `remoteServers` element as the iControl REST API spells it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRemoteServer {
    /// Entry name.
    pub name: String,
    /// Remote host.
    pub host: String,
    /// Remote port, omitted by some versions when it is the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_port: Option<u16>,
    /// Local IP or `none`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_ip: Option<String>,
}

/// The `/mgmt/tm/sys/syslog` object; only `remoteServers` is of interest.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSyslog {
    /// Configured remote servers; absent when none are configured.
    #[serde(default)]
    pub remote_servers: Vec<ApiRemoteServer>,
}

impl RemoteServer {
    /// Normalize an API record.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first unusable field.
    pub fn from_api(api: &ApiRemoteServer) -> Result<Self, String> {
        let remote_host =
            canonical_host(&api.host).map_err(|e| format!("entry {}: host {e}", api.name))?;
        let local_ip = api
            .local_ip
            .as_deref()
            .map_or(Ok(LocalIp::None), str::parse::<LocalIp>)
            .map_err(|e| format!("entry {}: localIp {e}", api.name))?;
        Ok(Self {
            name: api.name.clone(),
            remote_host,
            remote_port: api.remote_port.unwrap_or(DEFAULT_REMOTE_PORT),
            local_ip,
        })
    }

    /// Convert back to the API spelling.
    #[must_use]
    pub fn to_api(&self) -> ApiRemoteServer {
        ApiRemoteServer {
            name: self.name.clone(),
            host: self.remote_host.clone(),
            remote_port: Some(self.remote_port),
            local_ip: Some(self.local_ip.to_string()),
        }
    }
}

impl ApiSyslog {
    /// Normalize every remote server entry.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first unusable entry.
    pub fn remote_servers(&self) -> Result<Vec<RemoteServer>, String> {
        self.remote_servers.iter().map(RemoteServer::from_api).collect()
    }
}

/// Canonical form of a host: IP addresses in standard notation, hostnames
/// lower-cased.
///
/// # Errors
///
/// Returns a reason if the host is empty or contains whitespace.
pub fn canonical_host(host: &str) -> Result<String, String> {
    let host = host.trim();
    if host.is_empty() {
        return Err("must not be empty".to_string());
    }
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip.to_string());
    }
    if host.chars().any(char::is_whitespace) {
        return Err(format!("'{host}' is not a valid host name"));
    }
    Ok(host.to_ascii_lowercase())
}

/// Prefix bare names with the `Common` partition.
fn qualify_name(name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/Common/{name}")
    }
}

fn port(param: &'static str, value: i64) -> Result<u16, ValidationError> {
    u16::try_from(value)
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| ValidationError::InvalidValue {
            param,
            reason: format!("{value} is not between 1 and 65535"),
        })
}
