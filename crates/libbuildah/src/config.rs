//! Caller parameters and their validated, normalized form
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::capabilities;

pub const DEFAULT_BUILDAH_EXECUTABLE: &str = "buildah";
pub const DEFAULT_PODMAN_EXECUTABLE: &str = "podman";

/// Accepted range for relative block IO weights
pub const BLKIO_WEIGHT_RANGE: std::ops::RangeInclusive<u16> = 10..=1000;

/// Annotation under which the creation options that `buildah inspect`
/// does not report are stored on the container.
pub const CREATE_RECORD_ANNOTATION: &str = "buildah-container.create-options";

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("container name must not be empty")]
    EmptyName,
    #[error("state '{state}' requires image to be configured")]
    MissingImage { state: State },
    #[error("capability '{capability}' cannot be dropped and added")]
    CapabilityConflict { capability: String },
    #[error("blkio weight {weight} is outside of 10..=1000")]
    InvalidBlkioWeight { weight: u16 },
    #[error("blkio weight {weight} for device {device} is outside of 10..=1000")]
    InvalidBlkioDeviceWeight { device: String, weight: u16 },
    #[error("invalid cgroups mode '{0}', expected 'enabled' or 'disabled'")]
    InvalidCgroupsMode(String),
    #[error("cgroups 'disabled' conflicts with {option}")]
    CgroupsDisabledConflict { option: &'static str },
    #[error("command {0:?} is not a valid shell word list")]
    InvalidCommand(String),
    #[error("invalid state '{0}', expected present, absent or created")]
    InvalidState(String),
}

type Result<T> = std::result::Result<T, ValidationError>;

/// Target state requested by the caller
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Present,
    Absent,
    // buildah has no notion of a running working container, so this
    // behaves exactly like present
    Created,
}

impl State {
    /// Whether the container must exist once reconciliation is done
    pub fn wants_container(&self) -> bool {
        matches!(self, State::Present | State::Created)
    }
}

impl Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let print = match *self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Created => "created",
        };

        write!(f, "{print}")
    }
}

impl FromStr for State {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            "created" => Ok(Self::Created),
            other => Err(ValidationError::InvalidState(other.to_owned())),
        }
    }
}

/// Whether the container gets its own cgroups
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CgroupsMode {
    Enabled,
    Disabled,
}

impl CgroupsMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }
}

impl FromStr for CgroupsMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "enabled" => Ok(Self::Enabled),
            "disabled" => Ok(Self::Disabled),
            other => Err(ValidationError::InvalidCgroupsMode(other.to_owned())),
        }
    }
}

/// A command override, either one shell line or an argument list
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum CommandParam {
    Line(String),
    Args(Vec<String>),
}

/// Raw parameters as handed over by the caller
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ContainerParams {
    pub name: String,
    pub state: State,
    pub image: Option<String>,
    pub annotation: Option<BTreeMap<String, String>>,
    pub authfile: Option<PathBuf>,
    pub blkio_weight: Option<u16>,
    pub blkio_weight_device: Option<BTreeMap<String, u16>>,
    #[serde(alias = "capabilities")]
    pub cap_add: Option<Vec<String>>,
    pub cap_drop: Option<Vec<String>>,
    pub cgroup_parent: Option<String>,
    pub cgroupns: Option<String>,
    pub cgroups: Option<String>,
    pub cidfile: Option<PathBuf>,
    pub command: Option<CommandParam>,
    pub debug: bool,
    pub env: Option<BTreeMap<String, String>>,
    pub executable: Option<PathBuf>,
    pub podman_executable: Option<PathBuf>,
    #[serde(alias = "working_dir")]
    pub workdir: Option<String>,
    pub check_mode: bool,
}

/// Validated description of the container the caller wants.
///
/// Only [`DesiredSpec::from_params`] builds one, so every instance already
/// satisfies the invariants: an image is set whenever the state needs a
/// container, and the capability add and drop sets are disjoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredSpec {
    pub name: String,
    pub state: State,
    pub image: Option<String>,
    pub annotations: BTreeMap<String, String>,
    pub authfile: Option<PathBuf>,
    pub blkio_weight: Option<u16>,
    pub blkio_weight_device: BTreeMap<String, u16>,
    pub cap_add: BTreeSet<String>,
    pub cap_drop: BTreeSet<String>,
    pub cgroup_parent: Option<String>,
    pub cgroupns: Option<String>,
    pub cgroups: Option<CgroupsMode>,
    pub cidfile: Option<PathBuf>,
    pub command: Option<Vec<String>>,
    pub debug: bool,
    pub env: BTreeMap<String, String>,
    pub executable: PathBuf,
    pub podman_executable: PathBuf,
    pub workdir: Option<String>,
}

impl DesiredSpec {
    /// Validates and normalizes caller parameters. Performs no I/O.
    pub fn from_params(params: ContainerParams) -> Result<Self> {
        if params.name.is_empty() {
            return Err(ValidationError::EmptyName);
        }

        let image = params.image.filter(|image| !image.is_empty());
        if params.state.wants_container() && image.is_none() {
            return Err(ValidationError::MissingImage {
                state: params.state,
            });
        }

        let cap_add = capabilities::normalize_all(params.cap_add.unwrap_or_default());
        let cap_drop = capabilities::normalize_all(params.cap_drop.unwrap_or_default());
        if let Some(cap) = capabilities::find_conflict(&cap_add, &cap_drop) {
            return Err(ValidationError::CapabilityConflict {
                capability: cap.to_owned(),
            });
        }

        if let Some(weight) = params.blkio_weight {
            if !BLKIO_WEIGHT_RANGE.contains(&weight) {
                return Err(ValidationError::InvalidBlkioWeight { weight });
            }
        }
        let blkio_weight_device = params.blkio_weight_device.unwrap_or_default();
        if let Some((device, weight)) = blkio_weight_device
            .iter()
            .find(|(_, weight)| !BLKIO_WEIGHT_RANGE.contains(*weight))
        {
            return Err(ValidationError::InvalidBlkioDeviceWeight {
                device: device.to_owned(),
                weight: *weight,
            });
        }

        let cgroups = params
            .cgroups
            .as_deref()
            .map(CgroupsMode::from_str)
            .transpose()?;
        if cgroups == Some(CgroupsMode::Disabled) {
            if params.cgroupns.is_some() {
                return Err(ValidationError::CgroupsDisabledConflict { option: "cgroupns" });
            }
            if params.cgroup_parent.is_some() {
                return Err(ValidationError::CgroupsDisabledConflict {
                    option: "cgroup_parent",
                });
            }
        }

        let command = match params.command {
            None => None,
            Some(CommandParam::Args(args)) => Some(args),
            Some(CommandParam::Line(line)) => {
                Some(shlex::split(&line).ok_or(ValidationError::InvalidCommand(line))?)
            }
        };

        Ok(Self {
            name: params.name,
            state: params.state,
            image,
            annotations: params.annotation.unwrap_or_default(),
            authfile: params.authfile,
            blkio_weight: params.blkio_weight,
            blkio_weight_device,
            cap_add,
            cap_drop,
            cgroup_parent: params.cgroup_parent,
            cgroupns: params.cgroupns,
            cgroups,
            cidfile: params.cidfile,
            command,
            debug: params.debug,
            env: params.env.unwrap_or_default(),
            executable: params
                .executable
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BUILDAH_EXECUTABLE)),
            podman_executable: params
                .podman_executable
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PODMAN_EXECUTABLE)),
            workdir: params.workdir.as_deref().map(normalize_workdir),
        })
    }
}

/// Empty means the root directory, and trailing slashes carry no meaning.
pub fn normalize_workdir(dir: &str) -> String {
    let trimmed = dir.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Creation options that `buildah inspect` does not report back. They are
/// kept on the container as an annotation so later runs can compare them.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct CreateRecord {
    pub blkio_weight: Option<u16>,
    pub blkio_weight_device: BTreeMap<String, u16>,
    pub cgroups: Option<CgroupsMode>,
}

impl CreateRecord {
    pub fn from_spec(spec: &DesiredSpec) -> Self {
        Self {
            blkio_weight: spec.blkio_weight,
            blkio_weight_device: spec.blkio_weight_device.clone(),
            cgroups: spec.cgroups,
        }
    }

    pub fn to_annotation(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_annotation(value: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(value)
    }
}
