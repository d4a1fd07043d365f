//! External systems the reconcilers read from and write to.
//!
//! Each backend is a trait ([`SyslogDevice`](bigip::SyslogDevice),
//! [`AclAccessor`](windows_acl::AclAccessor)) with one production
//! implementation, so tests can substitute doubles without touching a device
//! or the filesystem.
pub mod bigip;
pub mod windows_acl;
