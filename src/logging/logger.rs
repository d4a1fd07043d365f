//! Structured logger with check-mode awareness and summary collection.
use std::path::PathBuf;
use std::sync::Mutex;

use super::subscriber::{DRY_RUN_TARGET, STAGE_TARGET};
use super::types::{Log, ModuleEntry, ModuleStatus};
use super::utils::log_file_path;

/// Implement the display methods of [`Log`] by delegating to inherent methods
/// of the same name on the implementing type.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Structured logger with check-mode awareness and summary collection.
///
/// All messages are also written to a persistent log file at
/// `$XDG_CACHE_HOME/reconcile/<command>.log` with timestamps and ANSI codes
/// stripped, regardless of the verbose flag.
#[derive(Debug)]
pub struct Logger {
    modules: Mutex<Vec<ModuleEntry>>,
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Create a new logger.
    ///
    /// The log file itself is created by
    /// [`init_subscriber`](super::subscriber::init_subscriber); this
    /// constructor only remembers its path for the summary.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            modules: Mutex::new(Vec::new()),
            log_file: log_file_path(command),
        }
    }

    /// Return the log file path, if available.
    #[cfg(test)]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Return a clone of all recorded module entries.
    #[must_use]
    pub fn module_entries(&self) -> Vec<ModuleEntry> {
        self.modules.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a debug message (suppressed on console unless verbose; always
    /// written to the log file).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Log a check-mode action message.
    pub fn dry_run(&self, msg: &str) {
        tracing::info!(target: DRY_RUN_TARGET, "{msg}");
    }

    /// Record a module result for the summary.
    pub fn record_module(&self, name: &str, status: ModuleStatus, message: Option<&str>) {
        if let Ok(mut guard) = self.modules.lock() {
            guard.push(ModuleEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }

    /// Count the number of failed module runs.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.modules.lock().map_or(0, |guard| {
            guard
                .iter()
                .filter(|m| m.status == ModuleStatus::Failed)
                .count()
        })
    }

    /// Log the summary of all recorded module runs.
    pub fn print_summary(&self) {
        let modules = self.module_entries();
        if modules.is_empty() {
            return;
        }

        self.stage("Summary");

        let mut ok = 0u32;
        let mut changed = 0u32;
        let mut dry_run = 0u32;
        let mut failed = 0u32;

        for module in &modules {
            let (icon, color) = match module.status {
                ModuleStatus::Ok => {
                    ok += 1;
                    ("✓", "\x1b[32m")
                }
                ModuleStatus::Changed => {
                    changed += 1;
                    ("●", "\x1b[33m")
                }
                ModuleStatus::DryRun => {
                    dry_run += 1;
                    ("~", "\x1b[37m")
                }
                ModuleStatus::Failed => {
                    failed += 1;
                    ("✗", "\x1b[31m")
                }
            };

            let suffix = module
                .message
                .as_ref()
                .map_or_else(String::new, |msg| format!(" ({msg})"));

            self.info(&format!("{color}{icon} {}{suffix}\x1b[0m", module.name));
        }

        let total = ok + changed + dry_run + failed;
        self.info(&format!(
            "{total} modules: \x1b[32m{ok} ok\x1b[0m, \x1b[33m{changed} changed\x1b[0m, \x1b[37m{dry_run} check\x1b[0m, \x1b[31m{failed} failed\x1b[0m"
        ));

        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error, dry_run);

    fn record_module(&self, name: &str, status: ModuleStatus, message: Option<&str>) {
        self.record_module(name, status, message);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::isolated_logger;
    use std::fs;

    #[test]
    fn logger_new() {
        let (log, _tmp, _guard) = isolated_logger();
        assert!(log.module_entries().is_empty());
    }

    #[test]
    fn record_module_with_message() {
        let (log, _tmp, _guard) = isolated_logger();
        log.record_module("remote_syslog 10.0.0.1", ModuleStatus::Failed, Some("HTTP 401"));
        let entries = log.module_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, ModuleStatus::Failed);
        assert_eq!(entries[0].message, Some("HTTP 401".to_string()));
    }

    #[test]
    fn failure_count_returns_correct_count() {
        let (log, _tmp, _guard) = isolated_logger();
        assert_eq!(log.failure_count(), 0);
        log.record_module("a", ModuleStatus::Ok, None);
        log.record_module("b", ModuleStatus::Failed, Some("error 1"));
        log.record_module("c", ModuleStatus::Changed, None);
        log.record_module("d", ModuleStatus::Failed, Some("error 2"));
        assert_eq!(log.failure_count(), 2);
    }

    #[test]
    fn log_trait_delegates_to_logger() {
        let (log, _tmp, _guard) = isolated_logger();
        let log_ref: &dyn Log = &log;
        log_ref.record_module("via-trait", ModuleStatus::Ok, None);
        assert_eq!(log.module_entries().len(), 1);
    }

    #[test]
    fn debug_always_written_to_file() {
        let (log, _tmp, _guard) = isolated_logger();
        let marker = format!("debug-marker-{}", std::process::id());
        log.debug(&marker);
        let contents = fs::read_to_string(log.log_path().expect("log path")).unwrap();
        assert!(contents.contains(&marker));
    }

    #[test]
    fn dry_run_written_to_file_with_tag() {
        let (log, _tmp, _guard) = isolated_logger();
        let marker = format!("check-marker-{}", std::process::id());
        log.dry_run(&marker);
        let contents = fs::read_to_string(log.log_path().expect("log path")).unwrap();
        assert!(contents.contains("[check]"));
        assert!(contents.contains(&marker));
    }

    #[test]
    fn stage_written_to_file_with_arrow() {
        let (log, _tmp, _guard) = isolated_logger();
        log.stage("stage-marker");
        let contents = fs::read_to_string(log.log_path().expect("log path")).unwrap();
        assert!(contents.contains("==> stage-marker"));
    }

    #[test]
    fn summary_is_written_to_file() {
        let (log, _tmp, _guard) = isolated_logger();
        log.record_module("acl_inheritance C:\\apache", ModuleStatus::Changed, None);
        log.print_summary();
        let contents = fs::read_to_string(log.log_path().expect("log path")).unwrap();
        assert!(contents.contains("1 modules"));
        assert!(contents.contains("acl_inheritance C:\\apache"));
    }
}
