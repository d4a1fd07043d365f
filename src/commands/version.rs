//! Command: print version information.

/// Version string baked in at build time.
#[must_use]
pub fn version() -> &'static str {
    option_env!("RECONCILE_VERSION").unwrap_or(concat!("dev-", env!("CARGO_PKG_VERSION")))
}

/// Print the reconcile version to stdout.
#[allow(clippy::print_stdout)]
pub fn run() {
    println!("reconcile {}", version());
}
