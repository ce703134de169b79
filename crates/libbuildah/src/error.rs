//! Failure taxonomy of one reconciliation
use crate::diff::Attribute;
use crate::plan::Step;

pub use crate::config::ValidationError;
pub use crate::runtime::RuntimeError;

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("invalid container configuration")]
    Validation(#[from] ValidationError),
    #[error("failed to inspect container {name}")]
    Inspection {
        name: String,
        source: RuntimeError,
    },
    #[error("failed to {step} container")]
    ExternalTool { step: Step, source: RuntimeError },
    #[error("runtime rejected in-place update of {attribute}, which is classified as patchable")]
    PlanInconsistency {
        attribute: Attribute,
        source: RuntimeError,
    },
}

impl ReconcileError {
    /// The error and all of its causes on one line
    pub fn report(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::State;
    use crate::diff::Patch;

    fn failed(command: &str) -> RuntimeError {
        RuntimeError::Failed {
            command: command.to_owned(),
            code: Some(125),
            stderr: "boom".to_owned(),
        }
    }

    #[test]
    fn test_report_includes_causes() {
        let err = ReconcileError::ExternalTool {
            step: Step::Create,
            source: failed("buildah from --name c1 img"),
        };
        assert_eq!(
            err.report(),
            "failed to create container: `buildah from --name c1 img` exited with status 125: boom"
        );
    }

    #[test]
    fn test_validation_report() {
        let err = ReconcileError::from(ValidationError::MissingImage {
            state: State::Present,
        });
        assert_eq!(
            err.report(),
            "invalid container configuration: state 'present' requires image to be configured"
        );
    }

    #[test]
    fn test_plan_inconsistency_names_attribute() {
        let err = ReconcileError::PlanInconsistency {
            attribute: Patch::Workdir("/srv".to_owned()).attribute(),
            source: failed("buildah config --workingdir /srv c1"),
        };
        assert!(err.report().starts_with("runtime rejected in-place update of workdir"));
    }
}
