//! Command: run every module listed in a TOML argument file.
use anyhow::{Context as _, Result};

use crate::cli::{GlobalOpts, RunOpts};
use crate::config::ArgsFile;
use crate::logging::Logger;

/// Run the `run` subcommand.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or any module failed.
pub fn run(global: &GlobalOpts, opts: &RunOpts, log: &Logger) -> Result<()> {
    log.stage("Loading arguments");
    let modules = ArgsFile::load(&opts.file)
        .with_context(|| format!("loading {}", opts.file.display()))?
        .into_modules();
    log.info(&format!(
        "{} module(s) in {}",
        modules.len(),
        opts.file.display()
    ));
    if modules.is_empty() {
        log.warn("argument file lists no modules");
        return Ok(());
    }
    super::run_on_host(&modules, global.check, log)
}
