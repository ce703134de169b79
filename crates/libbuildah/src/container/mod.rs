//! Inspected state of a buildah working container
mod snapshot;

pub use snapshot::{ContainerSnapshot, Inspection, NamespaceOption};
