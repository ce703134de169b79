//! Implements the Runtime trait by invoking the buildah and podman binaries
use std::path::{Path, PathBuf};
use std::process::Command;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::DesiredSpec;
use crate::container::{ContainerSnapshot, Inspection};
use crate::diff::Patch;
use crate::runtime::{args, InvocationLog, Result, Runtime, RuntimeError};

/// stderr fragments buildah prints when a container does not exist
const NOT_FOUND_MARKERS: &[&str] = &["no such container", "container not known"];

// `container c1 does not exist`, but not a missing storage path
static CONTAINER_DOES_NOT_EXIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bcontainer "?[^\s"/]+"? does not exist"#).expect("valid not found regex")
});

/// Outcome of one finished tool invocation
#[derive(Debug)]
struct ToolOutput {
    command: String,
    code: Option<i32>,
    success: bool,
    stdout: String,
    stderr: String,
}

impl ToolOutput {
    fn not_found(&self) -> bool {
        is_not_found(&self.stderr)
    }

    fn into_error(self) -> RuntimeError {
        RuntimeError::Failed {
            command: self.command,
            code: self.code,
            stderr: self.stderr.trim().to_owned(),
        }
    }
}

pub fn is_not_found(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    NOT_FOUND_MARKERS.iter().any(|marker| stderr.contains(marker))
        || CONTAINER_DOES_NOT_EXIST.is_match(&stderr)
}

/// Container tooling reached through its command line interface
#[derive(Debug, Clone)]
pub struct BuildahRuntime {
    /// buildah binary, the build tool
    buildah: PathBuf,
    /// podman binary, the run tool, used to resolve image references
    podman: PathBuf,
}

impl BuildahRuntime {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(buildah: P, podman: Q) -> Self {
        Self {
            buildah: buildah.into(),
            podman: podman.into(),
        }
    }

    pub fn from_spec(spec: &DesiredSpec) -> Self {
        Self::new(&spec.executable, &spec.podman_executable)
    }

    fn run(&self, program: &Path, args: &[String]) -> Result<ToolOutput> {
        let command = args::render(program, args);
        tracing::debug!(%command, "running");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| RuntimeError::Spawn {
                command: command.clone(),
                source: err,
            })?;

        let result = ToolOutput {
            command,
            code: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::trace!(?result, "finished");
        Ok(result)
    }

    fn run_logged(&self, args: &[String], log: &mut InvocationLog) -> Result<ToolOutput> {
        log.push(args::render(&self.buildah, args));
        self.run(&self.buildah, args)
    }
}

impl Runtime for BuildahRuntime {
    #[tracing::instrument(skip(self))]
    fn inspect(&self, name: &str) -> Result<ContainerSnapshot> {
        let output = self.run(&self.buildah, &args::inspect(name))?;
        if !output.success {
            if output.not_found() {
                tracing::debug!(name, "container does not exist");
                return Ok(ContainerSnapshot::Absent);
            }
            return Err(output.into_error());
        }

        let inspection =
            Inspection::from_json(&output.stdout).map_err(|err| RuntimeError::MalformedOutput {
                command: output.command,
                source: err,
            })?;
        Ok(ContainerSnapshot::Present(inspection))
    }

    #[tracing::instrument(skip(self))]
    fn resolve_image(&self, image: &str) -> Result<Option<String>> {
        let output = self.run(&self.podman, &args::image_id(image))?;
        if !output.success {
            // most likely not pulled yet, buildah from will fetch it
            tracing::debug!(image, stderr = output.stderr.trim(), "image is not available locally");
            return Ok(None);
        }

        let id = output.stdout.trim();
        Ok((!id.is_empty()).then(|| id.to_owned()))
    }

    #[tracing::instrument(skip_all, fields(name = %spec.name))]
    fn create(&self, spec: &DesiredSpec, log: &mut InvocationLog) -> Result<()> {
        // validation guarantees an image whenever a container is wanted
        let image = spec.image.as_deref().unwrap_or_default();
        let output = self.run_logged(&args::from(spec, image), log)?;
        if !output.success {
            return Err(output.into_error());
        }
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(name = %spec.name))]
    fn configure(&self, spec: &DesiredSpec, log: &mut InvocationLog) -> Result<()> {
        let output = self.run_logged(&args::create_config(spec)?, log)?;
        if !output.success {
            return Err(output.into_error());
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, log))]
    fn remove(&self, name: &str, log: &mut InvocationLog) -> Result<()> {
        let output = self.run_logged(&args::remove(name), log)?;
        if !output.success {
            if output.not_found() {
                tracing::debug!(name, "container was already gone");
                return Ok(());
            }
            return Err(output.into_error());
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, log))]
    fn update(&self, name: &str, patch: &Patch, log: &mut InvocationLog) -> Result<()> {
        let output = self.run_logged(&args::update(name, patch)?, log)?;
        if !output.success {
            return Err(output.into_error());
        }
        Ok(())
    }
}
