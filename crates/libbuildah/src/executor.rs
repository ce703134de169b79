//! Runs an action plan against the runtime
use crate::config::DesiredSpec;
use crate::error::ReconcileError;
use crate::plan::{ActionPlan, Step};
use crate::runtime::buildah::is_not_found;
use crate::runtime::{InvocationLog, Runtime, RuntimeError};

/// What happened while running a plan. Steps after a failure never run.
#[derive(Debug, Default)]
pub struct Execution {
    pub completed: Vec<Step>,
    pub invocations: InvocationLog,
    pub error: Option<ReconcileError>,
}

impl Execution {
    pub fn changed(&self) -> bool {
        self.completed.iter().any(|step| *step != Step::NoOp)
    }
}

/// Executes the steps of `plan` in order and stops at the first failure.
/// `spec` supplies the create command line.
pub fn execute(runtime: &dyn Runtime, plan: &ActionPlan, spec: &DesiredSpec) -> Execution {
    let mut execution = Execution::default();
    for step in plan.steps() {
        let outcome = run_step(runtime, plan.target(), step, spec, &mut execution.invocations);
        if let Err(failure) = outcome {
            tracing::error!(
                container = plan.target(),
                %step,
                applied = failure.applied,
                error = %failure.error.report(),
                "step failed"
            );
            if failure.applied {
                execution.completed.push(step.clone());
            }
            execution.error = Some(failure.error);
            break;
        }
        tracing::debug!(container = plan.target(), %step, "step done");
        execution.completed.push(step.clone());
    }
    execution
}

/// A step that failed. `applied` is set when it changed the container
/// before failing, like a create whose configuration was refused.
struct StepFailure {
    applied: bool,
    error: ReconcileError,
}

impl From<ReconcileError> for StepFailure {
    fn from(error: ReconcileError) -> Self {
        Self {
            applied: false,
            error,
        }
    }
}

fn run_step(
    runtime: &dyn Runtime,
    name: &str,
    step: &Step,
    spec: &DesiredSpec,
    log: &mut InvocationLog,
) -> Result<(), StepFailure> {
    let tool_error = |source| ReconcileError::ExternalTool {
        step: step.clone(),
        source,
    };
    match step {
        Step::NoOp => Ok(()),
        Step::Create => {
            runtime.create(spec, log).map_err(tool_error)?;
            // the container exists from here on
            runtime.configure(spec, log).map_err(|source| StepFailure {
                applied: true,
                error: tool_error(source),
            })
        }
        Step::Remove => Ok(runtime.remove(name, log).map_err(tool_error)?),
        Step::Update(patch) => runtime.update(name, patch, log).map_err(|err| {
            // gone since inspection, nothing wrong with the plan
            let vanished =
                matches!(&err, RuntimeError::Failed { stderr, .. } if is_not_found(stderr));
            let error = match err {
                // the tool ran and refused the change
                RuntimeError::Failed { .. } if !vanished => ReconcileError::PlanInconsistency {
                    attribute: patch.attribute(),
                    source: err,
                },
                err => tool_error(err),
            };
            StepFailure::from(error)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContainerParams, State};
    use crate::container::ContainerSnapshot;
    use crate::diff::{self, Attribute, Patch};
    use crate::plan;
    use crate::runtime::test::Operation;
    use crate::runtime::TestHelperRuntime;

    fn spec(workdir: &str) -> DesiredSpec {
        DesiredSpec::from_params(ContainerParams {
            name: "c1".to_owned(),
            image: Some("img:latest".to_owned()),
            workdir: Some(workdir.to_owned()),
            ..Default::default()
        })
        .unwrap()
    }

    fn create(runtime: &TestHelperRuntime, spec: &DesiredSpec) {
        let mut log = InvocationLog::new();
        runtime.create(spec, &mut log).unwrap();
        runtime.configure(spec, &mut log).unwrap();
    }

    fn plan_for(runtime: &TestHelperRuntime, spec: &DesiredSpec) -> ActionPlan {
        let snapshot = runtime.inspect(&spec.name).unwrap();
        let diffs = diff::diff(spec, &snapshot, None);
        plan::plan(&spec.name, spec.state, &snapshot, &diffs)
    }

    #[test]
    fn test_create() {
        let runtime = TestHelperRuntime::default();
        let spec = spec("/src");
        let execution = execute(&runtime, &plan_for(&runtime, &spec), &spec);
        assert!(execution.error.is_none());
        assert!(execution.changed());
        assert_eq!(execution.completed, vec![Step::Create]);
        assert_eq!(execution.invocations.len(), 2);
        assert!(runtime.exists("c1"));
    }

    #[test]
    fn test_noop_runs_nothing() {
        let runtime = TestHelperRuntime::default();
        let spec = spec("/src");
        execute(&runtime, &plan_for(&runtime, &spec), &spec);

        let execution = execute(&runtime, &plan_for(&runtime, &spec), &spec);
        assert!(!execution.changed());
        assert!(execution.invocations.is_empty());
    }

    #[test]
    fn test_halts_after_failed_create() {
        let runtime = TestHelperRuntime::default();
        create(&runtime, &spec("/src"));
        runtime.fail_next(Operation::Create, 1);

        let mut params = ContainerParams {
            name: "c1".to_owned(),
            image: Some("img:latest".to_owned()),
            ..Default::default()
        };
        params.cap_add = Some(vec!["net_raw".to_owned()]);
        let spec = DesiredSpec::from_params(params).unwrap();
        let plan = plan_for(&runtime, &spec);
        assert!(plan.is_recreate());

        let execution = execute(&runtime, &plan, &spec);
        assert_eq!(execution.completed, vec![Step::Remove]);
        assert!(execution.changed());
        assert!(matches!(
            execution.error,
            Some(ReconcileError::ExternalTool {
                step: Step::Create,
                ..
            })
        ));
        assert!(!runtime.exists("c1"));
    }

    #[test]
    fn test_rejected_update_is_plan_inconsistency() {
        let runtime = TestHelperRuntime::default();
        create(&runtime, &spec("/src"));
        runtime.fail_next(Operation::Update, 1);

        let spec = spec("/srv");
        let plan = plan_for(&runtime, &spec);
        assert_eq!(plan.steps(), &[Step::Update(Patch::Workdir("/srv".to_owned()))]);

        let execution = execute(&runtime, &plan, &spec);
        assert!(execution.completed.is_empty());
        assert!(matches!(
            execution.error,
            Some(ReconcileError::PlanInconsistency {
                attribute: Attribute::Workdir,
                ..
            })
        ));
        assert_eq!(execution.invocations, vec!["buildah config --workingdir /srv c1"]);
    }

    #[test]
    fn test_vanished_container_is_tool_failure() {
        let runtime = TestHelperRuntime::default();
        create(&runtime, &spec("/src"));
        let spec = spec("/srv");
        let plan = plan_for(&runtime, &spec);
        runtime.vanish("c1");

        let execution = execute(&runtime, &plan, &spec);
        assert!(!execution.changed());
        assert!(matches!(
            execution.error,
            Some(ReconcileError::ExternalTool {
                step: Step::Update(_),
                ..
            })
        ));
    }

    #[test]
    fn test_refused_configuration_still_counts_as_created() {
        let runtime = TestHelperRuntime::default();
        runtime.fail_next(Operation::Configure, 1);
        let spec = spec("/src");
        let plan = plan_for(&runtime, &spec);

        let execution = execute(&runtime, &plan, &spec);
        assert!(execution.changed());
        assert_eq!(execution.completed, vec![Step::Create]);
        assert_eq!(execution.invocations.len(), 2);
        assert!(matches!(
            execution.error,
            Some(ReconcileError::ExternalTool {
                step: Step::Create,
                ..
            })
        ));
        assert!(runtime.exists("c1"));
    }

    #[test]
    fn test_remove() {
        let runtime = TestHelperRuntime::default();
        create(&runtime, &spec("/src"));
        let absent = DesiredSpec::from_params(ContainerParams {
            name: "c1".to_owned(),
            state: State::Absent,
            ..Default::default()
        })
        .unwrap();
        let plan = plan::plan("c1", State::Absent, &runtime.inspect("c1").unwrap(), &[]);
        let execution = execute(&runtime, &plan, &absent);
        assert_eq!(execution.completed, vec![Step::Remove]);
        assert_eq!(runtime.inspect("c1").unwrap(), ContainerSnapshot::Absent);
        assert_eq!(runtime.get_remove_args(), vec!["c1".to_owned()]);
    }
}
