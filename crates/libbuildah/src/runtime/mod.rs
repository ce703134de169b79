//! Contains a wrapper of the external container tooling.
//! This provides a uniform interface for the rest of the reconciler
//! to inspect, create, remove and update containers.

pub mod args;
pub mod buildah;
#[allow(clippy::module_inception)]
pub mod runtime;

pub use buildah::BuildahRuntime;
pub use runtime::{InvocationLog, Runtime};
pub use test::TestHelperRuntime;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("failed to execute `{command}`")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("`{command}` exited with {}: {stderr}", exit_code(.code))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("failed to parse output of `{command}`")]
    MalformedOutput {
        command: String,
        source: serde_json::Error,
    },
    #[error("failed to encode {what} for {container}")]
    Encode {
        what: &'static str,
        container: String,
        source: serde_json::Error,
    },
}

fn exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_owned(),
    }
}

type Result<T> = std::result::Result<T, RuntimeError>;
