use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capabilities;
use crate::config::{normalize_workdir, CreateRecord, CREATE_RECORD_ANNOTATION};

/// Point-in-time read of the runtime's record for one container
#[derive(Debug, Clone, PartialEq)]
pub enum ContainerSnapshot {
    Absent,
    Present(Inspection),
}

impl ContainerSnapshot {
    pub fn is_present(&self) -> bool {
        matches!(self, ContainerSnapshot::Present(_))
    }

    pub fn inspection(&self) -> Option<&Inspection> {
        match self {
            ContainerSnapshot::Absent => None,
            ContainerSnapshot::Present(inspection) => Some(inspection),
        }
    }

    /// The runtime's own inspection document, or an empty object
    pub fn to_value(&self) -> Value {
        match self {
            ContainerSnapshot::Absent => Value::Object(Default::default()),
            ContainerSnapshot::Present(inspection) => inspection.raw().clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct NamespaceOption {
    pub name: String,
    #[serde(default)]
    pub host: bool,
    #[serde(default)]
    pub path: String,
}

// The subset of `buildah inspect --type container` output the reconciler
// looks at. Anything the runtime reports as null is an Option here.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, rename_all = "PascalCase")]
struct InspectDocument {
    container: String,
    #[serde(rename = "ContainerID")]
    container_id: String,
    from_image: String,
    #[serde(rename = "FromImageID")]
    from_image_id: String,
    from_image_digest: String,
    add_capabilities: Option<Vec<String>>,
    drop_capabilities: Option<Vec<String>>,
    image_annotations: Option<BTreeMap<String, String>>,
    namespace_options: Option<Vec<NamespaceOption>>,
    common_build_opts: Option<CommonBuildOpts>,
    #[serde(rename = "OCIv1")]
    oci_v1: Option<OciImage>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, rename_all = "PascalCase")]
struct CommonBuildOpts {
    cgroup_parent: String,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
struct OciImage {
    config: Option<OciImageConfig>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, rename_all = "PascalCase")]
struct OciImageConfig {
    env: Option<Vec<String>>,
    cmd: Option<Vec<String>>,
    working_dir: String,
}

/// A parsed inspection document of an existing container.
///
/// Keeps the raw document around so callers get back exactly what the
/// runtime reported, while the accessors give a normalized view for
/// comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Inspection {
    raw: Value,
    doc: InspectDocument,
}

impl Inspection {
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(data)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        // some buildah releases wrap the document into a single element list
        let raw = match value {
            Value::Array(mut items) if items.len() == 1 => items.remove(0),
            other => other,
        };
        let doc = serde_json::from_value(raw.clone())?;
        Ok(Self { raw, doc })
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn name(&self) -> &str {
        &self.doc.container
    }

    pub fn id(&self) -> &str {
        &self.doc.container_id
    }

    pub fn from_image(&self) -> &str {
        &self.doc.from_image
    }

    pub fn from_image_id(&self) -> &str {
        &self.doc.from_image_id
    }

    pub fn from_image_digest(&self) -> &str {
        &self.doc.from_image_digest
    }

    pub fn add_capabilities(&self) -> BTreeSet<String> {
        capabilities::normalize_all(self.doc.add_capabilities.iter().flatten())
    }

    pub fn drop_capabilities(&self) -> BTreeSet<String> {
        capabilities::normalize_all(self.doc.drop_capabilities.iter().flatten())
    }

    pub fn annotations(&self) -> BTreeMap<String, String> {
        self.doc.image_annotations.clone().unwrap_or_default()
    }

    pub fn env(&self) -> BTreeMap<String, String> {
        self.config()
            .and_then(|config| config.env.as_ref())
            .into_iter()
            .flatten()
            .map(|entry| match entry.split_once('=') {
                Some((key, value)) => (key.to_owned(), value.to_owned()),
                None => (entry.to_owned(), String::new()),
            })
            .collect()
    }

    pub fn workdir(&self) -> String {
        normalize_workdir(
            self.config()
                .map(|config| config.working_dir.as_str())
                .unwrap_or_default(),
        )
    }

    pub fn command(&self) -> Option<Vec<String>> {
        self.config().and_then(|config| config.cmd.clone())
    }

    pub fn cgroup_parent(&self) -> Option<String> {
        self.doc
            .common_build_opts
            .as_ref()
            .map(|opts| opts.cgroup_parent.clone())
            .filter(|parent| !parent.is_empty())
    }

    /// cgroup namespace in the same vocabulary `--cgroupns` accepts
    pub fn cgroupns(&self) -> Option<String> {
        let ns = self
            .doc
            .namespace_options
            .iter()
            .flatten()
            .find(|ns| ns.name == "cgroup")?;
        Some(if ns.host {
            "host".to_owned()
        } else if !ns.path.is_empty() {
            ns.path.clone()
        } else {
            "private".to_owned()
        })
    }

    /// Options stored at creation time. A container created by other means,
    /// or carrying an unreadable record, reports none.
    pub fn create_record(&self) -> CreateRecord {
        let Some(value) = self
            .doc
            .image_annotations
            .as_ref()
            .and_then(|annotations| annotations.get(CREATE_RECORD_ANNOTATION))
        else {
            return CreateRecord::default();
        };

        CreateRecord::from_annotation(value).unwrap_or_else(|err| {
            tracing::warn!(?err, container = self.name(), "ignoring unreadable creation record");
            CreateRecord::default()
        })
    }

    fn config(&self) -> Option<&OciImageConfig> {
        self.doc.oci_v1.as_ref().and_then(|image| image.config.as_ref())
    }
}
