//! Compares the desired configuration against an inspected container.
//!
//! Every attribute the reconciler manages is listed in [`Attribute`]. Whether
//! a difference can be fixed in place or forces a recreate is decided by the
//! [`PATCHABLE`] allow-list alone; anything not on it is recreated.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::config::DesiredSpec;
use crate::container::{ContainerSnapshot, Inspection};

/// A full or abbreviated image ID, optionally with its algorithm
static IMAGE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(sha256:)?[0-9a-f]{12,64}$").expect("valid image id regex"));

const DEFAULT_TAG: &str = "latest";

/// Container attributes the reconciler compares
#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Image,
    CapAdd,
    CapDrop,
    CgroupParent,
    Cgroupns,
    Cgroups,
    BlkioWeight,
    BlkioWeightDevice,
    Annotation,
    Env,
    Workdir,
    Command,
}

/// Attributes buildah can change on an existing container with
/// `buildah config`. Everything else is fixed at `buildah from` time.
pub const PATCHABLE: &[Attribute] = &[
    Attribute::Annotation,
    Attribute::Env,
    Attribute::Workdir,
    Attribute::Command,
];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Policy {
    Patchable,
    RequiresRecreate,
}

impl Attribute {
    pub const ALL: [Attribute; 12] = [
        Attribute::Image,
        Attribute::CapAdd,
        Attribute::CapDrop,
        Attribute::CgroupParent,
        Attribute::Cgroupns,
        Attribute::Cgroups,
        Attribute::BlkioWeight,
        Attribute::BlkioWeightDevice,
        Attribute::Annotation,
        Attribute::Env,
        Attribute::Workdir,
        Attribute::Command,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Attribute::Image => "image",
            Attribute::CapAdd => "cap_add",
            Attribute::CapDrop => "cap_drop",
            Attribute::CgroupParent => "cgroup_parent",
            Attribute::Cgroupns => "cgroupns",
            Attribute::Cgroups => "cgroups",
            Attribute::BlkioWeight => "blkio_weight",
            Attribute::BlkioWeightDevice => "blkio_weight_device",
            Attribute::Annotation => "annotation",
            Attribute::Env => "env",
            Attribute::Workdir => "workdir",
            Attribute::Command => "command",
        }
    }

    pub fn policy(&self) -> Policy {
        if PATCHABLE.contains(self) {
            Policy::Patchable
        } else {
            Policy::RequiresRecreate
        }
    }
}

impl Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An in-place change of one attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch {
    /// Annotations to set, other annotations are left alone
    Annotations(BTreeMap<String, String>),
    /// Environment variables to set, other variables are left alone
    Env(BTreeMap<String, String>),
    Workdir(String),
    Command(Vec<String>),
}

impl Patch {
    pub fn attribute(&self) -> Attribute {
        match self {
            Patch::Annotations(_) => Attribute::Annotation,
            Patch::Env(_) => Attribute::Env,
            Patch::Workdir(_) => Attribute::Workdir,
            Patch::Command(_) => Attribute::Command,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Patchable(Patch),
    RequiresRecreate,
}

/// One attribute that differs. Attributes that already match produce no
/// entry at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDiff {
    pub attribute: Attribute,
    pub desired: String,
    pub actual: String,
    pub classification: Classification,
}

impl AttributeDiff {
    pub fn requires_recreate(&self) -> bool {
        self.classification == Classification::RequiresRecreate
    }
}

/// Lists every attribute in which the container differs from the spec.
///
/// `resolved_image` is the ID the desired image reference currently points
/// to, when the run tool could tell. An absent container differs in every
/// attribute.
pub fn diff(
    spec: &DesiredSpec,
    snapshot: &ContainerSnapshot,
    resolved_image: Option<&str>,
) -> Vec<AttributeDiff> {
    let inspection = match snapshot {
        ContainerSnapshot::Absent => {
            return Attribute::ALL
                .iter()
                .map(|attribute| AttributeDiff {
                    attribute: *attribute,
                    desired: desired_value(spec, *attribute),
                    actual: String::new(),
                    classification: Classification::RequiresRecreate,
                })
                .collect();
        }
        ContainerSnapshot::Present(inspection) => inspection,
    };

    Attribute::ALL
        .iter()
        .filter_map(|attribute| compare(spec, inspection, *attribute, resolved_image))
        .collect()
}

fn compare(
    spec: &DesiredSpec,
    inspection: &Inspection,
    attribute: Attribute,
    resolved_image: Option<&str>,
) -> Option<AttributeDiff> {
    // (actual value, in-place patch) for attributes that differ
    let (actual, patch) = match attribute {
        Attribute::Image => {
            let desired = spec.image.as_deref()?;
            if image_matches(desired, inspection, resolved_image) {
                return None;
            }
            let actual = match inspection.from_image_id() {
                "" => inspection.from_image().to_owned(),
                id => format!("{} ({id})", inspection.from_image()),
            };
            (actual, None)
        }
        Attribute::CapAdd => {
            let actual = inspection.add_capabilities();
            if actual == spec.cap_add {
                return None;
            }
            (fmt_set(&actual), None)
        }
        Attribute::CapDrop => {
            let actual = inspection.drop_capabilities();
            if actual == spec.cap_drop {
                return None;
            }
            (fmt_set(&actual), None)
        }
        Attribute::CgroupParent => {
            let desired = spec.cgroup_parent.as_deref()?;
            let actual = inspection.cgroup_parent();
            if actual.as_deref() == Some(desired) {
                return None;
            }
            (fmt_option(actual.as_ref()), None)
        }
        Attribute::Cgroupns => {
            let desired = spec.cgroupns.as_deref()?;
            let desired = desired.strip_prefix("ns:").unwrap_or(desired);
            let actual = inspection.cgroupns();
            if actual.as_deref() == Some(desired) {
                return None;
            }
            (fmt_option(actual.as_ref()), None)
        }
        Attribute::Cgroups => {
            let actual = inspection.create_record().cgroups;
            if actual == spec.cgroups {
                return None;
            }
            (fmt_option(actual.map(|mode| mode.as_str()).as_ref()), None)
        }
        Attribute::BlkioWeight => {
            let actual = inspection.create_record().blkio_weight;
            if actual == spec.blkio_weight {
                return None;
            }
            (fmt_option(actual.as_ref()), None)
        }
        Attribute::BlkioWeightDevice => {
            let actual = inspection.create_record().blkio_weight_device;
            if actual == spec.blkio_weight_device {
                return None;
            }
            (fmt_map(&actual), None)
        }
        Attribute::Annotation => {
            let actual = inspection.annotations();
            let missing = missing_entries(&spec.annotations, &actual);
            if missing.is_empty() {
                return None;
            }
            (fmt_map(&actual), Some(Patch::Annotations(missing)))
        }
        Attribute::Env => {
            let actual = inspection.env();
            let missing = missing_entries(&spec.env, &actual);
            if missing.is_empty() {
                return None;
            }
            (fmt_map(&actual), Some(Patch::Env(missing)))
        }
        Attribute::Workdir => {
            let desired = spec.workdir.as_ref()?;
            let actual = inspection.workdir();
            if &actual == desired {
                return None;
            }
            (actual, Some(Patch::Workdir(desired.to_owned())))
        }
        Attribute::Command => {
            let desired = spec.command.as_ref()?;
            let actual = inspection.command();
            if actual.as_ref() == Some(desired) {
                return None;
            }
            (
                fmt_option(actual.map(|cmd| cmd.join(" ")).as_ref()),
                Some(Patch::Command(desired.to_owned())),
            )
        }
    };

    let classification = match (attribute.policy(), patch) {
        (Policy::Patchable, Some(patch)) => Classification::Patchable(patch),
        _ => Classification::RequiresRecreate,
    };
    Some(AttributeDiff {
        attribute,
        desired: desired_value(spec, attribute),
        actual,
        classification,
    })
}

/// Desired entries that are missing from actual or carry another value
fn missing_entries(
    desired: &BTreeMap<String, String>,
    actual: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    desired
        .iter()
        .filter(|(key, value)| actual.get(*key) != Some(*value))
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
}

/// Whether the container was built from the desired image.
///
/// Resolved IDs are authoritative when both sides have one, which is how a
/// tag that moved to a newer image is noticed. Otherwise the reference is
/// matched as an ID prefix, a digest, or a name with tag.
pub fn image_matches(desired: &str, inspection: &Inspection, resolved_image: Option<&str>) -> bool {
    let actual_id = strip_algorithm(inspection.from_image_id());
    if let Some(resolved) = resolved_image {
        if !actual_id.is_empty() {
            return strip_algorithm(resolved) == actual_id;
        }
    }

    if IMAGE_ID.is_match(desired) {
        return !actual_id.is_empty() && actual_id.starts_with(strip_algorithm(desired));
    }

    if let Some((_, digest)) = desired.split_once('@') {
        return inspection.from_image_digest() == digest;
    }

    let desired = with_default_tag(desired);
    let actual = with_default_tag(inspection.from_image());
    actual == desired || actual.ends_with(&format!("/{desired}"))
}

fn strip_algorithm(id: &str) -> &str {
    id.strip_prefix("sha256:").unwrap_or(id)
}

/// Appends `:latest` to references without a tag. A colon before the last
/// slash belongs to a registry port, not to a tag.
fn with_default_tag(reference: &str) -> String {
    let last = reference.rsplit('/').next().unwrap_or(reference);
    if last.contains(':') || reference.is_empty() {
        reference.to_owned()
    } else {
        format!("{reference}:{DEFAULT_TAG}")
    }
}

fn desired_value(spec: &DesiredSpec, attribute: Attribute) -> String {
    match attribute {
        Attribute::Image => fmt_option(spec.image.as_ref()),
        Attribute::CapAdd => fmt_set(&spec.cap_add),
        Attribute::CapDrop => fmt_set(&spec.cap_drop),
        Attribute::CgroupParent => fmt_option(spec.cgroup_parent.as_ref()),
        Attribute::Cgroupns => fmt_option(spec.cgroupns.as_ref()),
        Attribute::Cgroups => fmt_option(spec.cgroups.map(|mode| mode.as_str()).as_ref()),
        Attribute::BlkioWeight => fmt_option(spec.blkio_weight.as_ref()),
        Attribute::BlkioWeightDevice => fmt_map(&spec.blkio_weight_device),
        Attribute::Annotation => fmt_map(&spec.annotations),
        Attribute::Env => fmt_map(&spec.env),
        Attribute::Workdir => fmt_option(spec.workdir.as_ref()),
        Attribute::Command => fmt_option(spec.command.as_ref().map(|cmd| cmd.join(" ")).as_ref()),
    }
}

fn fmt_option<T: Display>(value: Option<&T>) -> String {
    value.map_or_else(|| "<unset>".to_owned(), |v| v.to_string())
}

fn fmt_set(set: &BTreeSet<String>) -> String {
    format!("[{}]", set.iter().cloned().collect::<Vec<_>>().join(", "))
}

fn fmt_map<V: Display>(map: &BTreeMap<String, V>) -> String {
    let entries: Vec<String> = map.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{{{}}}", entries.join(", "))
}
