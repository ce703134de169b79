//! An interface trait so that the rest of the reconciler can drive the
//! container tooling without having to worry about how it is invoked
use crate::config::DesiredSpec;
use crate::container::ContainerSnapshot;
use crate::diff::Patch;
use crate::runtime::Result;

/// Literal command lines, in the order they were run
pub type InvocationLog = Vec<String>;

/// Operations the reconciler needs from the container tooling.
///
/// Mutating operations append every command line they run to `log` before
/// running it, so a failing command still shows up in the trace.
pub trait Runtime {
    /// Current state of the named container. A container that does not
    /// exist is reported as [`ContainerSnapshot::Absent`], not as an error.
    fn inspect(&self, name: &str) -> Result<ContainerSnapshot>;
    /// ID of the local image a reference points to, if it is present
    fn resolve_image(&self, image: &str) -> Result<Option<String>>;
    /// Builds a new container with the creation-time options of `spec`.
    /// Once this succeeds the container exists.
    fn create(&self, spec: &DesiredSpec, log: &mut InvocationLog) -> Result<()>;
    /// Applies the configurable attributes of `spec` and the creation record
    /// to a container [`Runtime::create`] just built
    fn configure(&self, spec: &DesiredSpec, log: &mut InvocationLog) -> Result<()>;
    /// Removes the container. Removing a missing container succeeds.
    fn remove(&self, name: &str, log: &mut InvocationLog) -> Result<()>;
    /// Changes one attribute of an existing container in place
    fn update(&self, name: &str, patch: &Patch, log: &mut InvocationLog) -> Result<()>;
}
