//! The reconcile engine: check, diff, apply at most once, report.
//!
//! ```text
//! UNKNOWN -> CHECKED(exists|absent) -> {NO_CHANGE, CREATE, UPDATE} -> DONE
//!                                                  any error -> FAILED
//! ```
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{CollaboratorError, ReconcileError};
use crate::logging::Log;
use crate::resources::{Collaborator, Resource};

/// Engine phase, recorded in order for every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing known yet.
    Unknown,
    /// Existence has been checked.
    Checked {
        /// Whether the entity exists.
        exists: bool,
    },
    /// Desired and current state already agree.
    NoChange,
    /// The entity is being created.
    Create,
    /// The existing entity is being updated.
    Update,
    /// Finished successfully.
    Done,
    /// Finished with an error.
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Checked { exists: true } => write!(f, "checked(exists)"),
            Self::Checked { exists: false } => write!(f, "checked(absent)"),
            Self::NoChange => write!(f, "no_change"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of one module invocation; serialized as one JSON object.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationResult {
    /// Module name.
    pub module: &'static str,
    /// Whether a change was applied (or would be, in check mode).
    pub changed: bool,
    /// Echoed attribute values.
    #[serde(flatten)]
    pub values: Map<String, Value>,
    /// Phases visited, in order.
    #[serde(skip)]
    pub trace: Vec<Phase>,
}

impl ReconciliationResult {
    /// Single-line JSON rendering.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be serialized.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Records phase transitions and mirrors them to the debug log.
struct Tracker<'a> {
    description: String,
    log: &'a dyn Log,
    trace: Vec<Phase>,
}

impl<'a> Tracker<'a> {
    fn new(description: String, log: &'a dyn Log) -> Self {
        Self {
            description,
            log,
            trace: vec![Phase::Unknown],
        }
    }

    fn enter(&mut self, phase: Phase) {
        self.log.debug(&format!("{}: {phase}", self.description));
        self.trace.push(phase);
    }

    fn fail(&mut self, err: ReconcileError) -> ReconcileError {
        self.enter(Phase::Failed);
        err
    }
}

/// Reconcile `resource` against `collaborator`.
///
/// Issues at most one mutating call.  In check mode the plan is logged and no
/// mutating call is made; `changed` reports whether one would have been.
///
/// # Errors
///
/// Returns the first [`ReconcileError`] raised by the collaborator, or
/// [`CollaboratorError::CreateFailed`] if a create reported success but the
/// entity still does not exist.
pub fn reconcile<R, C>(
    resource: &R,
    collaborator: &C,
    check_mode: bool,
    log: &dyn Log,
) -> Result<ReconciliationResult, ReconcileError>
where
    R: Resource,
    C: Collaborator<Current = R::Current, Changes = R::Changes>,
{
    let mut tracker = Tracker::new(resource.description(), log);
    let (changed, values) =
        run(resource, collaborator, check_mode, &mut tracker).map_err(|e| tracker.fail(e))?;
    tracker.enter(Phase::Done);
    Ok(ReconciliationResult {
        module: resource.module(),
        changed,
        values,
        trace: tracker.trace,
    })
}

fn run<R, C>(
    resource: &R,
    collaborator: &C,
    check_mode: bool,
    tracker: &mut Tracker<'_>,
) -> Result<(bool, Map<String, Value>), ReconcileError>
where
    R: Resource,
    C: Collaborator<Current = R::Current, Changes = R::Changes>,
{
    let exists = collaborator.exists()?;
    tracker.enter(Phase::Checked { exists });

    if exists {
        let current = collaborator.read_current()?;
        let Some(changes) = resource.diff(&current) else {
            tracker.enter(Phase::NoChange);
            return Ok((false, resource.report_unchanged(Some(&current))));
        };
        tracker.enter(Phase::Update);
        apply(tracker, check_mode, &changes, || collaborator.update(&changes))?;
        return Ok((true, resource.report_changes(&changes)));
    }

    let Some(changes) = resource.plan_create()? else {
        tracker.enter(Phase::NoChange);
        return Ok((false, resource.report_unchanged(None)));
    };
    tracker.enter(Phase::Create);
    apply(tracker, check_mode, &changes, || collaborator.create(&changes))?;
    if !check_mode && !collaborator.exists()? {
        return Err(CollaboratorError::CreateFailed(tracker.description.clone()).into());
    }
    Ok((true, resource.report_changes(&changes)))
}

/// Log the planned change, then perform it unless in check mode.
fn apply<D, F>(
    tracker: &Tracker<'_>,
    check_mode: bool,
    changes: &D,
    write: F,
) -> Result<(), ReconcileError>
where
    D: fmt::Display,
    F: FnOnce() -> Result<(), ReconcileError>,
{
    if check_mode {
        tracker
            .log
            .dry_run(&format!("would {changes}: {}", tracker.description));
        return Ok(());
    }
    tracker.log.info(&format!("{changes}: {}", tracker.description));
    write()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::error::AmbiguousStateError;
    use crate::logging::isolated_logger;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    /// A counter that should equal `want`.
    struct Counter {
        want: u32,
        create_if_missing: bool,
    }

    impl Resource for Counter {
        type Current = u32;
        type Changes = u32;

        fn module(&self) -> &'static str {
            "counter"
        }

        fn description(&self) -> String {
            "counter".to_string()
        }

        fn plan_create(&self) -> Result<Option<u32>, ReconcileError> {
            Ok(self.create_if_missing.then_some(self.want))
        }

        fn diff(&self, current: &u32) -> Option<u32> {
            (*current != self.want).then_some(self.want)
        }

        fn report_changes(&self, changes: &u32) -> Map<String, Value> {
            Map::from_iter([("value".to_string(), Value::from(*changes))])
        }

        fn report_unchanged(&self, current: Option<&u32>) -> Map<String, Value> {
            current
                .map(|c| Map::from_iter([("value".to_string(), Value::from(*c))]))
                .unwrap_or_default()
        }
    }

    #[derive(Default)]
    struct FakeCounter {
        exists: RefCell<VecDeque<Result<bool, ReconcileError>>>,
        value: Cell<u32>,
        creates: Cell<u32>,
        updates: Cell<u32>,
    }

    impl FakeCounter {
        fn answering(exists: &[bool], value: u32) -> Self {
            Self {
                exists: RefCell::new(exists.iter().map(|e| Ok(*e)).collect()),
                value: Cell::new(value),
                ..Self::default()
            }
        }
    }

    impl Collaborator for FakeCounter {
        type Current = u32;
        type Changes = u32;

        fn exists(&self) -> Result<bool, ReconcileError> {
            self.exists.borrow_mut().pop_front().unwrap_or(Ok(true))
        }

        fn read_current(&self) -> Result<u32, ReconcileError> {
            Ok(self.value.get())
        }

        fn create(&self, changes: &u32) -> Result<(), ReconcileError> {
            self.creates.set(self.creates.get() + 1);
            self.value.set(*changes);
            Ok(())
        }

        fn update(&self, changes: &u32) -> Result<(), ReconcileError> {
            self.updates.set(self.updates.get() + 1);
            self.value.set(*changes);
            Ok(())
        }
    }

    fn counter(want: u32) -> Counter {
        Counter {
            want,
            create_if_missing: true,
        }
    }

    #[test]
    fn matching_state_is_no_change() {
        let (log, _tmp, _guard) = isolated_logger();
        let fake = FakeCounter::answering(&[true], 5);
        let result = reconcile(&counter(5), &fake, false, &log).unwrap();
        assert!(!result.changed);
        assert_eq!(result.values["value"], 5);
        assert_eq!(fake.updates.get(), 0);
        assert_eq!(
            result.trace,
            vec![
                Phase::Unknown,
                Phase::Checked { exists: true },
                Phase::NoChange,
                Phase::Done
            ]
        );
    }

    #[test]
    fn mismatch_updates_once() {
        let (log, _tmp, _guard) = isolated_logger();
        let fake = FakeCounter::answering(&[true], 1);
        let result = reconcile(&counter(5), &fake, false, &log).unwrap();
        assert!(result.changed);
        assert_eq!(fake.updates.get(), 1);
        assert_eq!(fake.creates.get(), 0);
        assert_eq!(fake.value.get(), 5);
        assert!(result.trace.contains(&Phase::Update));
    }

    #[test]
    fn missing_entity_is_created_then_rechecked() {
        let (log, _tmp, _guard) = isolated_logger();
        let fake = FakeCounter::answering(&[false, true], 0);
        let result = reconcile(&counter(5), &fake, false, &log).unwrap();
        assert!(result.changed);
        assert_eq!(fake.creates.get(), 1);
        assert!(fake.exists.borrow().is_empty(), "existence checked twice");
        assert_eq!(
            result.trace,
            vec![
                Phase::Unknown,
                Phase::Checked { exists: false },
                Phase::Create,
                Phase::Done
            ]
        );
    }

    #[test]
    fn create_that_does_not_stick_fails() {
        let (log, _tmp, _guard) = isolated_logger();
        let fake = FakeCounter::answering(&[false, false], 0);
        let err = reconcile(&counter(5), &fake, false, &log).unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::Collaborator(CollaboratorError::CreateFailed(_))
        ));
    }

    #[test]
    fn missing_entity_that_should_stay_missing_is_no_change() {
        let (log, _tmp, _guard) = isolated_logger();
        let fake = FakeCounter::answering(&[false], 0);
        let resource = Counter {
            want: 5,
            create_if_missing: false,
        };
        let result = reconcile(&resource, &fake, false, &log).unwrap();
        assert!(!result.changed);
        assert_eq!(fake.creates.get(), 0);
    }

    #[test]
    fn check_mode_reports_change_without_writing() {
        let (log, _tmp, _guard) = isolated_logger();
        let fake = FakeCounter::answering(&[false], 0);
        let result = reconcile(&counter(5), &fake, true, &log).unwrap();
        assert!(result.changed);
        assert_eq!(fake.creates.get(), 0);

        let fake = FakeCounter::answering(&[true], 1);
        let result = reconcile(&counter(5), &fake, true, &log).unwrap();
        assert!(result.changed);
        assert_eq!(fake.updates.get(), 0);
        assert_eq!(fake.value.get(), 1);
    }

    #[test]
    fn second_run_is_idempotent() {
        let (log, _tmp, _guard) = isolated_logger();
        let fake = FakeCounter::answering(&[true, true], 1);
        assert!(reconcile(&counter(5), &fake, false, &log).unwrap().changed);
        assert!(!reconcile(&counter(5), &fake, false, &log).unwrap().changed);
    }

    #[test]
    fn collaborator_errors_are_surfaced_verbatim() {
        let (log, _tmp, _guard) = isolated_logger();
        let fake = FakeCounter::default();
        fake.exists.borrow_mut().push_back(Err(AmbiguousStateError {
            key: "10.0.0.1".to_string(),
            count: 2,
        }
        .into()));
        let err = reconcile(&counter(5), &fake, false, &log).unwrap_err();
        assert!(matches!(err, ReconcileError::Ambiguous(_)));
    }

    #[test]
    fn result_serializes_flat() {
        let result = ReconciliationResult {
            module: "remote_syslog",
            changed: true,
            values: Map::from_iter([
                ("remote_host".to_string(), Value::from("10.10.10.10")),
                ("remote_port".to_string(), Value::from(800)),
            ]),
            trace: vec![Phase::Done],
        };
        let json: Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        assert_eq!(json["module"], "remote_syslog");
        assert_eq!(json["changed"], true);
        assert_eq!(json["remote_port"], 800);
        assert!(json.get("trace").is_none());
    }

    #[test]
    fn phase_display() {
        assert_eq!(Phase::Checked { exists: false }.to_string(), "checked(absent)");
        assert_eq!(Phase::NoChange.to_string(), "no_change");
    }
}
