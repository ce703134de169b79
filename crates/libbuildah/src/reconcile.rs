//! Drives one reconciliation from inspection to the final report
use serde::Serialize;
use serde_json::Value;

use crate::config::DesiredSpec;
use crate::container::ContainerSnapshot;
use crate::diff;
use crate::error::ReconcileError;
use crate::executor;
use crate::plan;
use crate::runtime::Runtime;

/// Outcome handed back to the caller
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ReconcileResult {
    pub changed: bool,
    pub failed: bool,
    /// Human readable log, e.g. `recreated container`
    pub actions: Vec<String>,
    /// Literal command lines, only kept when debugging was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_invocations: Option<Vec<String>>,
    /// Inspection document of the container afterwards, `{}` when absent
    pub container: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReconcileResult {
    /// A failure that happened before anything was changed
    pub fn failure(err: &ReconcileError) -> Self {
        Self {
            changed: false,
            failed: true,
            actions: vec![],
            tool_invocations: None,
            container: ContainerSnapshot::Absent.to_value(),
            error: Some(err.report()),
        }
    }
}

/// Brings the container named in `spec` to the requested state.
///
/// Inspects the container, diffs it against the spec, plans and runs the
/// steps, and reports the container as it is afterwards. In check mode the
/// plan is reported without running it. Every failure ends up in the
/// returned result.
#[tracing::instrument(level = "debug", skip_all, fields(name = %spec.name, state = %spec.state))]
pub fn reconcile(runtime: &dyn Runtime, spec: &DesiredSpec, check_mode: bool) -> ReconcileResult {
    let snapshot = match runtime.inspect(&spec.name) {
        Ok(snapshot) => snapshot,
        Err(source) => {
            let err = ReconcileError::Inspection {
                name: spec.name.to_owned(),
                source,
            };
            tracing::error!(error = %err.report(), "cannot read container state");
            return ReconcileResult::failure(&err);
        }
    };

    let resolved_image = resolve_image(runtime, spec, &snapshot);
    let diffs = diff::diff(spec, &snapshot, resolved_image.as_deref());
    let plan = plan::plan(&spec.name, spec.state, &snapshot, &diffs);

    if check_mode {
        tracing::info!(actions = ?plan.describe(), "check mode, not executing");
        return ReconcileResult {
            changed: !plan.is_noop(),
            failed: false,
            actions: plan.describe(),
            tool_invocations: spec.debug.then(Vec::new),
            container: snapshot.to_value(),
            error: None,
        };
    }

    let execution = executor::execute(runtime, &plan, spec);
    let mut result = ReconcileResult {
        changed: execution.changed(),
        failed: false,
        actions: plan::describe(&execution.completed),
        tool_invocations: spec.debug.then(|| execution.invocations.clone()),
        container: Value::Null,
        error: None,
    };

    if let Some(err) = &execution.error {
        result.failed = true;
        result.error = Some(err.report());
        // show whatever is left behind, the failure itself is already reported
        result.container = match runtime.inspect(&spec.name) {
            Ok(after) => after.to_value(),
            Err(inspect_err) => {
                tracing::warn!(error = %inspect_err, "cannot read container state after failure");
                ContainerSnapshot::Absent.to_value()
            }
        };
        return result;
    }

    result.container = if plan.is_noop() {
        snapshot.to_value()
    } else if !spec.state.wants_container() {
        ContainerSnapshot::Absent.to_value()
    } else {
        match runtime.inspect(&spec.name) {
            Ok(after) => after.to_value(),
            Err(source) => {
                let err = ReconcileError::Inspection {
                    name: spec.name.to_owned(),
                    source,
                };
                result.failed = true;
                result.error = Some(err.report());
                ContainerSnapshot::Absent.to_value()
            }
        }
    };

    tracing::info!(changed = result.changed, actions = ?result.actions, "reconciled");
    result
}

// Only worth asking the run tool when there is a container to compare with
fn resolve_image(
    runtime: &dyn Runtime,
    spec: &DesiredSpec,
    snapshot: &ContainerSnapshot,
) -> Option<String> {
    if !snapshot.is_present() || !spec.state.wants_container() {
        return None;
    }
    let image = spec.image.as_deref()?;
    match runtime.resolve_image(image) {
        Ok(resolved) => resolved,
        Err(err) => {
            tracing::warn!(image, error = %err, "cannot resolve image, comparing by reference");
            None
        }
    }
}
