//! F5 BIG-IP iControl REST client for the `sys syslog` object.
use std::fmt;

use base64::Engine as _;
use serde::Serialize;

use crate::config::{ApiRemoteServer, ApiSyslog, ConnectionParams};
use crate::error::CollaboratorError;

const SYSLOG_PATH: &str = "/mgmt/tm/sys/syslog";

/// Read/write access to a device's remote syslog configuration.
#[cfg_attr(test, mockall::automock)]
pub trait SyslogDevice: Send + Sync + fmt::Debug {
    /// Fetch the `sys syslog` object.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError`] on transport failure, a non-2xx status,
    /// or an unparseable body.
    fn load_syslog(&self) -> Result<ApiSyslog, CollaboratorError>;

    /// Replace the full `remoteServers` list with `servers`, sent as given.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError`] on transport failure or a non-2xx status.
    fn modify_remote_servers(&self, servers: &[ApiRemoteServer]) -> Result<(), CollaboratorError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyBody<'a> {
    remote_servers: &'a [ApiRemoteServer],
}

/// [`SyslogDevice`] over HTTPS with basic authentication.
pub struct BigIpClient {
    agent: ureq::Agent,
    url: String,
    authorization: String,
}

impl fmt::Debug for BigIpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BigIpClient")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl BigIpClient {
    /// Build a client for the device described by `conn`.
    #[must_use]
    pub fn new(conn: &ConnectionParams) -> Self {
        let tls = ureq::tls::TlsConfig::builder()
            .disable_verification(!conn.validate_certs)
            .build();
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .tls_config(tls)
            .timeout_global(Some(conn.timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            url: syslog_url(&conn.server, conn.server_port),
            authorization: basic_auth(&conn.user, &conn.password),
        }
    }

    fn transport_error(&self, err: &ureq::Error) -> CollaboratorError {
        CollaboratorError::Transport {
            target: self.url.clone(),
            message: err.to_string(),
        }
    }

    fn check_status(&self, status: u16) -> Result<(), CollaboratorError> {
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(CollaboratorError::Status {
                target: self.url.clone(),
                status,
            })
        }
    }
}

impl SyslogDevice for BigIpClient {
    fn load_syslog(&self) -> Result<ApiSyslog, CollaboratorError> {
        let mut response = self
            .agent
            .get(&self.url)
            .header("Authorization", self.authorization.as_str())
            .call()
            .map_err(|e| self.transport_error(&e))?;
        self.check_status(response.status().as_u16())?;

        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| self.transport_error(&e))?;
        parse_syslog(&self.url, &body)
    }

    fn modify_remote_servers(&self, servers: &[ApiRemoteServer]) -> Result<(), CollaboratorError> {
        let body = ModifyBody {
            remote_servers: servers,
        };
        let json = serde_json::to_string(&body).map_err(|e| CollaboratorError::InvalidResponse {
            target: self.url.clone(),
            message: format!("cannot encode request: {e}"),
        })?;

        let response = self
            .agent
            .patch(&self.url)
            .header("Authorization", self.authorization.as_str())
            .header("Content-Type", "application/json")
            .send(json.as_bytes())
            .map_err(|e| self.transport_error(&e))?;
        self.check_status(response.status().as_u16())
    }
}

fn syslog_url(server: &str, port: u16) -> String {
    // Bare IPv6 literals need brackets in a URL authority.
    if server.contains(':') && !server.starts_with('[') {
        format!("https://[{server}]:{port}{SYSLOG_PATH}")
    } else {
        format!("https://{server}:{port}{SYSLOG_PATH}")
    }
}

fn basic_auth(user: &str, password: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{password}"));
    format!("Basic {encoded}")
}

/// Parse a `sys syslog` response body.
///
/// # Errors
///
/// Returns [`CollaboratorError::InvalidResponse`] if the body is not the
/// expected JSON object.
pub fn parse_syslog(target: &str, body: &str) -> Result<ApiSyslog, CollaboratorError> {
    serde_json::from_str(body).map_err(|e| CollaboratorError::InvalidResponse {
        target: target.to_string(),
        message: e.to_string(),
    })
}
