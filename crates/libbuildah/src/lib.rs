//! Declarative management of buildah working containers.
//!
//! Given a desired name, base image and a set of configuration attributes,
//! [`reconcile::reconcile`] makes sure a container matching that description
//! exists, is absent, or is brought into conformance. All interaction with
//! the container tooling goes through the [`runtime::Runtime`] trait.
#[cfg(test)]
#[macro_use]
extern crate quickcheck;

pub mod capabilities;
pub mod config;
pub mod container;
pub mod diff;
pub mod error;
pub mod executor;
pub mod plan;
pub mod reconcile;
pub mod runtime;

pub use config::{ContainerParams, DesiredSpec, State};
pub use error::ReconcileError;
pub use reconcile::{reconcile, ReconcileResult};
