//! Idempotent reconciliation engine.
//!
//! Compares desired configuration against a live system and applies only the
//! minimal change.  Two modules ship with it: Windows filesystem ACL
//! inheritance and F5 BIG-IP remote syslog servers.
//!
//! The public API is organised into these layers:
//!
//! - **[`config`]**: raw module arguments, validation, and normalization
//! - **[`backends`]**: the external systems (`PowerShell` ACLs, iControl REST)
//! - **[`resources`]**: desired state, diffing, and collaborator handles
//! - **[`reconcile`]**: the check / diff / apply engine
//! - **[`commands`]**: subcommand orchestration and JSON result output
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod backends;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod logging;
pub mod platform;
pub mod reconcile;
pub mod resources;
