//! Command-line interface definitions.
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{AclInheritanceArgs, RemoteSyslogArgs, State};

/// Top-level CLI entry point for the reconcile engine.
#[derive(Parser, Debug)]
#[command(
    name = "reconcile",
    about = "Idempotent reconciliation of Windows ACL inheritance and BIG-IP remote syslog",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Report what would change without changing anything
    #[arg(short = 'c', long, visible_alias = "dry-run", global = true)]
    pub check: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Enable or disable ACL inheritance on a path
    AclInheritance(AclInheritanceOpts),
    /// Manage a BIG-IP remote syslog server
    RemoteSyslog(RemoteSyslogOpts),
    /// Run every module listed in a TOML argument file
    Run(RunOpts),
    /// Print version information
    Version,
}

impl Command {
    /// Name used for the log file.
    #[must_use]
    pub const fn log_name(&self) -> &'static str {
        match self {
            Self::AclInheritance(_) => "acl-inheritance",
            Self::RemoteSyslog(_) => "remote-syslog",
            Self::Run(_) => "run",
            Self::Version => "version",
        }
    }
}

/// Options for the `acl-inheritance` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct AclInheritanceOpts {
    /// Path whose inheritance is managed
    #[arg(long)]
    pub path: String,

    /// `present` enables inheritance, `absent` disables it
    #[arg(long, value_enum, default_value_t = State::Absent)]
    pub state: State,

    /// Copy inherited entries when disabling, drop duplicates when enabling
    #[arg(long)]
    pub reorganize: bool,
}

impl From<AclInheritanceOpts> for AclInheritanceArgs {
    fn from(opts: AclInheritanceOpts) -> Self {
        Self {
            path: Some(opts.path),
            state: Some(opts.state),
            reorganize: Some(opts.reorganize),
        }
    }
}

/// Options for the `remote-syslog` subcommand.
#[derive(Parser, Clone)]
pub struct RemoteSyslogOpts {
    /// Syslog server address
    #[arg(long)]
    pub remote_host: String,

    /// Syslog server port
    #[arg(long)]
    pub remote_port: Option<i64>,

    /// Local IP the device sends from, or `none`
    #[arg(long)]
    pub local_ip: Option<String>,

    /// Name for a new entry (defaults to /Common/remotesyslog<N>)
    #[arg(long)]
    pub name: Option<String>,

    /// Whether the entry should exist
    #[arg(long, value_enum, default_value_t = State::Present)]
    pub state: State,

    /// BIG-IP management host
    #[arg(long)]
    pub server: String,

    /// BIG-IP management port
    #[arg(long, default_value_t = 443)]
    pub server_port: i64,

    /// Management user
    #[arg(long)]
    pub user: String,

    /// Management password
    #[arg(long, env = "RECONCILE_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub no_validate_certs: bool,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,
}

impl std::fmt::Debug for RemoteSyslogOpts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSyslogOpts")
            .field("remote_host", &self.remote_host)
            .field("server", &self.server)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl From<RemoteSyslogOpts> for RemoteSyslogArgs {
    fn from(opts: RemoteSyslogOpts) -> Self {
        Self {
            remote_host: Some(opts.remote_host),
            remote_port: opts.remote_port,
            local_ip: opts.local_ip,
            name: opts.name,
            state: Some(opts.state),
            server: Some(opts.server),
            server_port: Some(opts.server_port),
            user: Some(opts.user),
            password: Some(opts.password),
            validate_certs: Some(!opts.no_validate_certs),
            timeout: Some(opts.timeout),
        }
    }
}

/// Options for the `run` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct RunOpts {
    /// TOML argument file
    pub file: PathBuf,
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
    use clap::CommandFactory;

    const SYSLOG: [&str; 9] = [
        "reconcile",
        "remote-syslog",
        "--remote-host",
        "10.10.10.10",
        "--server",
        "bigip.example.com",
        "--user",
        "admin",
        "--password=secret",
    ];

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_acl_defaults() {
        let cli = Cli::parse_from(["reconcile", "acl-inheritance", "--path", "C:\\apache"]);
        let Command::AclInheritance(opts) = cli.command else {
            panic!("expected acl-inheritance");
        };
        assert_eq!(opts.state, State::Absent);
        assert!(!opts.reorganize);
    }

    #[test]
    fn parse_acl_present_reorganize() {
        let cli = Cli::parse_from([
            "reconcile",
            "acl-inheritance",
            "--path",
            "C:\\apache",
            "--state",
            "present",
            "--reorganize",
        ]);
        let Command::AclInheritance(opts) = cli.command else {
            panic!("expected acl-inheritance");
        };
        let args = AclInheritanceArgs::from(opts);
        assert_eq!(args.state, Some(State::Present));
        assert_eq!(args.reorganize, Some(true));
    }

    #[test]
    fn parse_remote_syslog_defaults() {
        let cli = Cli::parse_from(SYSLOG);
        let Command::RemoteSyslog(opts) = cli.command else {
            panic!("expected remote-syslog");
        };
        let args = RemoteSyslogArgs::from(opts);
        assert_eq!(args.remote_port, None);
        assert_eq!(args.server_port, Some(443));
        assert_eq!(args.validate_certs, Some(true));
        assert_eq!(args.timeout, Some(30));
        assert_eq!(args.state, Some(State::Present));
    }

    #[test]
    fn parse_remote_syslog_overrides() {
        let mut argv = SYSLOG.to_vec();
        argv.extend([
            "--remote-port",
            "800",
            "--local-ip",
            "2.2.2.2",
            "--no-validate-certs",
        ]);
        let cli = Cli::parse_from(argv);
        let Command::RemoteSyslog(opts) = cli.command else {
            panic!("expected remote-syslog");
        };
        let args = RemoteSyslogArgs::from(opts);
        assert_eq!(args.remote_port, Some(800));
        assert_eq!(args.local_ip.as_deref(), Some("2.2.2.2"));
        assert_eq!(args.validate_certs, Some(false));
    }

    #[test]
    fn parse_check_short_and_alias() {
        let cli = Cli::parse_from(["reconcile", "-c", "run", "modules.toml"]);
        assert!(cli.global.check);
        let cli = Cli::parse_from(["reconcile", "--dry-run", "run", "modules.toml"]);
        assert!(cli.global.check);
    }

    #[test]
    fn parse_run() {
        let cli = Cli::parse_from(["reconcile", "run", "modules.toml"]);
        let Command::Run(opts) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(opts.file, PathBuf::from("modules.toml"));
    }

    #[test]
    fn parse_version() {
        let cli = Cli::parse_from(["reconcile", "version"]);
        assert!(matches!(cli.command, Command::Version));
        assert_eq!(cli.command.log_name(), "version");
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::parse_from(["reconcile", "-v", "version"]);
        assert!(cli.verbose);
    }

    #[test]
    fn debug_output_hides_password() {
        let cli = Cli::parse_from(SYSLOG);
        assert!(!format!("{cli:?}").contains("secret"));
    }
}
