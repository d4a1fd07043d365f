//! Integration tests for ACL inheritance reconciliation against in-memory ACLs.
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]

mod common;

use std::sync::Arc;

use common::{FakeAcl, FakeBackends, RecordingLog, explicit_copy, rule};
use reconcile_cli::backends::windows_acl::{AccessRule, AclSnapshot, InheritanceChange};
use reconcile_cli::commands::acl_inheritance::reconcile;
use reconcile_cli::config::{AclInheritanceArgs, State};
use reconcile_cli::error::{CollaboratorError, ReconcileError};

const PATH: &str = "C:\\apache";

fn parent() -> Vec<AccessRule> {
    vec![
        rule("BUILTIN\\Users", "ReadAndExecute, Synchronize", true),
        rule("NT AUTHORITY\\SYSTEM", "FullControl", true),
    ]
}

fn inheriting() -> AclSnapshot {
    let mut rules = vec![rule("CONTOSO\\svc-web", "Modify", false)];
    rules.extend(parent());
    AclSnapshot {
        inheritance_enabled: true,
        rules,
    }
}

fn setup(snapshot: AclSnapshot) -> (Arc<FakeAcl>, FakeBackends) {
    let acl = Arc::new(FakeAcl::with_parent(parent()));
    acl.insert(PATH, snapshot);
    let backends = FakeBackends::acl(acl.clone());
    (acl, backends)
}

fn args(state: State, reorganize: bool) -> AclInheritanceArgs {
    AclInheritanceArgs {
        path: Some(PATH.to_string()),
        state: Some(state),
        reorganize: Some(reorganize),
    }
}

#[test]
fn disable_with_reorganize_keeps_inherited_entries_as_explicit() {
    let (acl, backends) = setup(inheriting());
    let log = RecordingLog::default();

    let result = reconcile(&args(State::Absent, true), &backends, false, &log).unwrap();

    assert!(result.changed);
    assert_eq!(result.values["state"], "absent");
    let after = acl.snapshot(PATH);
    assert!(!after.inheritance_enabled);
    assert_eq!(after.inherited().count(), 0);
    for inherited in parent() {
        assert!(
            after.explicit().any(|r| r.same_grant(&inherited)),
            "{} kept",
            inherited.identity
        );
    }
}

#[test]
fn disable_without_reorganize_drops_inherited_entries() {
    let (acl, backends) = setup(inheriting());
    let log = RecordingLog::default();

    reconcile(&args(State::Absent, false), &backends, false, &log).unwrap();

    let after = acl.snapshot(PATH);
    assert_eq!(after.rules, vec![rule("CONTOSO\\svc-web", "Modify", false)]);
}

#[test]
fn enable_with_reorganize_removes_explicit_duplicates() {
    let mut rules: Vec<_> = parent().iter().map(explicit_copy).collect();
    rules.push(rule("CONTOSO\\svc-web", "Modify", false));
    let (acl, backends) = setup(AclSnapshot {
        inheritance_enabled: false,
        rules,
    });
    let log = RecordingLog::default();

    let result = reconcile(&args(State::Present, true), &backends, false, &log).unwrap();

    assert!(result.changed);
    let after = acl.snapshot(PATH);
    assert!(after.inheritance_enabled);
    assert!(after.explicit_duplicates().is_empty());
    let explicit: Vec<&str> = after.explicit().map(|r| r.identity.as_str()).collect();
    assert_eq!(explicit, vec!["CONTOSO\\svc-web"]);
    assert_eq!(
        acl.applied(),
        vec![InheritanceChange::Enable {
            prune_duplicates: true
        }]
    );
}

#[test]
fn matching_state_is_unchanged_even_with_reorganize() {
    let (acl, backends) = setup(inheriting());
    let log = RecordingLog::default();

    let result = reconcile(&args(State::Present, true), &backends, false, &log).unwrap();

    assert!(!result.changed);
    assert_eq!(result.values["state"], "present");
    assert!(acl.applied().is_empty());
}

#[test]
fn second_run_is_unchanged() {
    let (acl, backends) = setup(inheriting());
    let log = RecordingLog::default();

    assert!(reconcile(&args(State::Absent, true), &backends, false, &log).unwrap().changed);
    assert!(!reconcile(&args(State::Absent, true), &backends, false, &log).unwrap().changed);
    assert_eq!(acl.applied().len(), 1);
}

#[test]
fn default_state_is_absent() {
    let (acl, backends) = setup(inheriting());
    let log = RecordingLog::default();
    let args = AclInheritanceArgs {
        path: Some(PATH.to_string()),
        ..AclInheritanceArgs::default()
    };

    assert!(reconcile(&args, &backends, false, &log).unwrap().changed);
    assert!(!acl.snapshot(PATH).inheritance_enabled);
}

#[test]
fn check_mode_does_not_touch_the_acl() {
    let (acl, backends) = setup(inheriting());
    let log = RecordingLog::default();

    let result = reconcile(&args(State::Absent, true), &backends, true, &log).unwrap();

    assert!(result.changed);
    assert!(acl.applied().is_empty());
    assert!(acl.snapshot(PATH).inheritance_enabled);
    assert_eq!(log.messages("dry_run").len(), 1);
}

#[test]
fn missing_path_is_not_found() {
    let (acl, backends) = setup(inheriting());
    let log = RecordingLog::default();
    let args = AclInheritanceArgs {
        path: Some("C:\\does-not-exist".to_string()),
        ..AclInheritanceArgs::default()
    };

    let err = reconcile(&args, &backends, false, &log).unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::Collaborator(CollaboratorError::NotFound(_))
    ));
    assert!(acl.applied().is_empty());
}

#[test]
fn blank_path_is_a_validation_error() {
    let (_acl, backends) = setup(inheriting());
    let log = RecordingLog::default();
    let args = AclInheritanceArgs {
        path: Some("  ".to_string()),
        ..AclInheritanceArgs::default()
    };
    assert!(matches!(
        reconcile(&args, &backends, false, &log).unwrap_err(),
        ReconcileError::Validation(_)
    ));
}

#[test]
fn unsupported_platform_is_a_collaborator_error() {
    let backends = FakeBackends::device(Arc::new(common::FakeDevice::default()));
    let log = RecordingLog::default();
    let err = reconcile(&args(State::Absent, false), &backends, false, &log).unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::Collaborator(CollaboratorError::Unsupported { .. })
    ));
}
