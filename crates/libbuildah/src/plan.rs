//! Decides which steps bring a container to the requested state.
//!
//! The planner is a pure function of the target state, the snapshot and the
//! diff list. It never touches the runtime.
use std::fmt::Display;

use crate::config::State;
use crate::container::ContainerSnapshot;
use crate::diff::{AttributeDiff, Classification, Patch};

pub const CREATED: &str = "created container";
pub const REMOVED: &str = "removed container";
pub const UPDATED: &str = "updated container";
pub const RECREATED: &str = "recreated container";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Create,
    Remove,
    /// Change one patchable attribute in place
    Update(Patch),
    NoOp,
}

impl Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Create => write!(f, "create"),
            Step::Remove => write!(f, "remove"),
            Step::Update(patch) => write!(f, "update {}", patch.attribute()),
            Step::NoOp => write!(f, "noop"),
        }
    }
}

/// Ordered steps for one container. Computed once, never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionPlan {
    target: String,
    steps: Vec<Step>,
}

impl ActionPlan {
    fn new(target: &str, steps: Vec<Step>) -> Self {
        Self {
            target: target.to_owned(),
            steps,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_noop(&self) -> bool {
        self.steps.iter().all(|step| *step == Step::NoOp)
    }

    pub fn is_recreate(&self) -> bool {
        self.steps == [Step::Remove, Step::Create]
    }

    /// What the plan would report if every step succeeded
    pub fn describe(&self) -> Vec<String> {
        describe(&self.steps)
    }
}

/// Human readable log for a sequence of steps that ran. A remove followed
/// by a create reads as one recreate, several updates as one update.
pub fn describe(steps: &[Step]) -> Vec<String> {
    let mut actions: Vec<String> = Vec::new();
    let mut iter = steps.iter().peekable();
    while let Some(step) = iter.next() {
        let action = match step {
            Step::NoOp => continue,
            Step::Remove if iter.peek() == Some(&&Step::Create) => {
                iter.next();
                RECREATED
            }
            Step::Remove => REMOVED,
            Step::Create => CREATED,
            Step::Update(_) => UPDATED,
        };
        if actions.last().map(String::as_str) != Some(action) {
            actions.push(action.to_owned());
        }
    }
    actions
}

/// Plans the steps for `name`.
///
/// | target          | container | diffs             | plan            |
/// |-----------------|-----------|-------------------|-----------------|
/// | absent          | absent    |                   | noop            |
/// | absent          | present   |                   | remove          |
/// | present/created | absent    |                   | create          |
/// | present/created | present   | none              | noop            |
/// | present/created | present   | all patchable     | update per diff |
/// | present/created | present   | any recreate      | remove, create  |
///
/// A recreate rebuilds from the whole desired configuration, so patchable diffs
/// found next to it are not applied on their own.
pub fn plan(
    name: &str,
    state: State,
    snapshot: &ContainerSnapshot,
    diffs: &[AttributeDiff],
) -> ActionPlan {
    let steps = match (state.wants_container(), snapshot.is_present()) {
        (false, false) => vec![Step::NoOp],
        (false, true) => vec![Step::Remove],
        (true, false) => vec![Step::Create],
        (true, true) if diffs.is_empty() => vec![Step::NoOp],
        (true, true) if diffs.iter().any(AttributeDiff::requires_recreate) => {
            for diff in diffs.iter().filter(|diff| diff.requires_recreate()) {
                tracing::info!(
                    container = name,
                    attribute = %diff.attribute,
                    desired = %diff.desired,
                    actual = %diff.actual,
                    "attribute can only change by recreating"
                );
            }
            vec![Step::Remove, Step::Create]
        }
        (true, true) => diffs
            .iter()
            .filter_map(|diff| match &diff.classification {
                Classification::Patchable(patch) => Some(Step::Update(patch.clone())),
                Classification::RequiresRecreate => None,
            })
            .collect(),
    };

    tracing::debug!(
        container = name,
        steps = ?steps.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "planned"
    );
    ActionPlan::new(name, steps)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::container::Inspection;
    use crate::diff::Attribute;

    fn present() -> ContainerSnapshot {
        ContainerSnapshot::Present(Inspection::from_json(r#"{"Container": "c1"}"#).unwrap())
    }

    fn recreate(attribute: Attribute) -> AttributeDiff {
        AttributeDiff {
            attribute,
            desired: "new".to_owned(),
            actual: "old".to_owned(),
            classification: Classification::RequiresRecreate,
        }
    }

    fn patch(patch: Patch) -> AttributeDiff {
        AttributeDiff {
            attribute: patch.attribute(),
            desired: "new".to_owned(),
            actual: "old".to_owned(),
            classification: Classification::Patchable(patch),
        }
    }

    #[test]
    fn test_absent_target() {
        let p = plan("c1", State::Absent, &ContainerSnapshot::Absent, &[]);
        assert!(p.is_noop());
        assert_eq!(p.steps(), &[Step::NoOp]);
        assert!(p.describe().is_empty());

        let p = plan("c1", State::Absent, &present(), &[]);
        assert_eq!(p.steps(), &[Step::Remove]);
        assert_eq!(p.describe(), vec![REMOVED]);
        assert_eq!(p.target(), "c1");
    }

    #[test]
    fn test_present_target() {
        for state in [State::Present, State::Created] {
            let p = plan("c1", state, &ContainerSnapshot::Absent, &[recreate(Attribute::Image)]);
            assert_eq!(p.steps(), &[Step::Create]);
            assert_eq!(p.describe(), vec![CREATED]);

            let p = plan("c1", state, &present(), &[]);
            assert!(p.is_noop());
        }
    }

    #[test]
    fn test_all_patchable_updates_in_place() {
        let env = Patch::Env(BTreeMap::from([("A".to_owned(), "1".to_owned())]));
        let workdir = Patch::Workdir("/srv".to_owned());
        let p = plan(
            "c1",
            State::Present,
            &present(),
            &[patch(env.clone()), patch(workdir.clone())],
        );
        assert_eq!(p.steps(), &[Step::Update(env), Step::Update(workdir)]);
        assert!(!p.is_recreate());
        assert_eq!(p.describe(), vec![UPDATED]);
    }

    #[test]
    fn test_any_recreate_wins() {
        let p = plan(
            "c1",
            State::Present,
            &present(),
            &[
                patch(Patch::Workdir("/srv".to_owned())),
                recreate(Attribute::CapAdd),
            ],
        );
        assert!(p.is_recreate());
        assert_eq!(p.steps(), &[Step::Remove, Step::Create]);
        assert_eq!(p.describe(), vec![RECREATED]);
    }

    #[test]
    fn test_describe_partial_recreate() {
        assert_eq!(describe(&[Step::Remove]), vec![REMOVED]);
        assert_eq!(describe(&[Step::Remove, Step::Create]), vec![RECREATED]);
        assert!(describe(&[]).is_empty());
    }
}
