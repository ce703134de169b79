//! Translates specs and patches into argument lists of the container tools
use std::path::Path;

use crate::config::{CreateRecord, DesiredSpec, CREATE_RECORD_ANNOTATION};
use crate::diff::Patch;
use crate::runtime::{Result, RuntimeError};

pub fn inspect(name: &str) -> Vec<String> {
    to_strings(["inspect", "--type", "container", name])
}

pub fn remove(name: &str) -> Vec<String> {
    to_strings(["rm", name])
}

/// Arguments for the run tool, printing only the image ID
pub fn image_id(image: &str) -> Vec<String> {
    to_strings(["image", "inspect", "--format", "{{.Id}}", image])
}

/// `buildah from` with every creation-time option of `spec`
pub fn from(spec: &DesiredSpec, image: &str) -> Vec<String> {
    let mut args = to_strings(["from", "--name", spec.name.as_str()]);
    if let Some(authfile) = &spec.authfile {
        args.push("--authfile".to_owned());
        args.push(authfile.display().to_string());
    }
    for cap in &spec.cap_add {
        args.push("--cap-add".to_owned());
        args.push(cap.to_owned());
    }
    for cap in &spec.cap_drop {
        args.push("--cap-drop".to_owned());
        args.push(cap.to_owned());
    }
    if let Some(weight) = spec.blkio_weight {
        args.push("--blkio-weight".to_owned());
        args.push(weight.to_string());
    }
    for (device, weight) in &spec.blkio_weight_device {
        args.push("--blkio-weight-device".to_owned());
        args.push(format!("{device}:{weight}"));
    }
    if let Some(parent) = &spec.cgroup_parent {
        args.push("--cgroup-parent".to_owned());
        args.push(parent.to_owned());
    }
    if let Some(cgroupns) = &spec.cgroupns {
        args.push("--cgroupns".to_owned());
        args.push(cgroupns.to_owned());
    }
    if let Some(mode) = spec.cgroups {
        args.push("--cgroups".to_owned());
        args.push(mode.as_str().to_owned());
    }
    if let Some(cidfile) = &spec.cidfile {
        args.push("--cidfile".to_owned());
        args.push(cidfile.display().to_string());
    }
    args.push(image.to_owned());
    args
}

/// `buildah config` applied right after `buildah from`. Sets every
/// configurable attribute of `spec` plus the creation record.
pub fn create_config(spec: &DesiredSpec) -> Result<Vec<String>> {
    let record = CreateRecord::from_spec(spec)
        .to_annotation()
        .map_err(|err| RuntimeError::Encode {
            what: "creation record",
            container: spec.name.to_owned(),
            source: err,
        })?;

    let mut args = to_strings(["config"]);
    for (key, value) in &spec.annotations {
        push_pair(&mut args, "--annotation", key, value);
    }
    push_pair(&mut args, "--annotation", CREATE_RECORD_ANNOTATION, &record);
    for (key, value) in &spec.env {
        push_pair(&mut args, "--env", key, value);
    }
    if let Some(workdir) = &spec.workdir {
        args.push("--workingdir".to_owned());
        args.push(workdir.to_owned());
    }
    if let Some(command) = &spec.command {
        args.push("--cmd".to_owned());
        args.push(encode_command(&spec.name, command)?);
    }
    args.push(spec.name.to_owned());
    Ok(args)
}

/// `buildah config` changing a single attribute in place
pub fn update(name: &str, patch: &Patch) -> Result<Vec<String>> {
    let mut args = to_strings(["config"]);
    match patch {
        Patch::Annotations(annotations) => {
            for (key, value) in annotations {
                push_pair(&mut args, "--annotation", key, value);
            }
        }
        Patch::Env(env) => {
            for (key, value) in env {
                push_pair(&mut args, "--env", key, value);
            }
        }
        Patch::Workdir(dir) => {
            args.push("--workingdir".to_owned());
            args.push(dir.to_owned());
        }
        Patch::Command(command) => {
            args.push("--cmd".to_owned());
            args.push(encode_command(name, command)?);
        }
    }
    args.push(name.to_owned());
    Ok(args)
}

/// Renders a command line the way a shell user would type it
pub fn render(program: &Path, args: &[String]) -> String {
    let program = program.display().to_string();
    let words = std::iter::once(program.as_str()).chain(args.iter().map(String::as_str));
    shlex::try_join(words.clone()).unwrap_or_else(|_| words.collect::<Vec<_>>().join(" "))
}

// JSON array form, so buildah does not run it through `sh -c`
fn encode_command(name: &str, command: &[String]) -> Result<String> {
    serde_json::to_string(command).map_err(|err| RuntimeError::Encode {
        what: "command",
        container: name.to_owned(),
        source: err,
    })
}

fn push_pair(args: &mut Vec<String>, flag: &str, key: &str, value: &str) {
    args.push(flag.to_owned());
    args.push(format!("{key}={value}"));
}

fn to_strings<const N: usize>(args: [&str; N]) -> Vec<String> {
    args.iter().map(|arg| arg.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    use super::*;
    use crate::config::{CommandParam, ContainerParams};

    fn full_spec() -> DesiredSpec {
        DesiredSpec::from_params(ContainerParams {
            name: "ci".to_owned(),
            image: Some("quay.io/rockylinux/rockylinux:8".to_owned()),
            authfile: Some(PathBuf::from("/run/auth.json")),
            cap_add: Some(vec!["net_raw".to_owned()]),
            cap_drop: Some(vec!["sys_admin".to_owned()]),
            blkio_weight: Some(300),
            blkio_weight_device: Some(BTreeMap::from([("/dev/sda".to_owned(), 200)])),
            cgroup_parent: Some("/machine.slice".to_owned()),
            cgroupns: Some("private".to_owned()),
            cgroups: Some("enabled".to_owned()),
            cidfile: Some(PathBuf::from("/tmp/ci.cid")),
            annotation: Some(BTreeMap::from([("owner".to_owned(), "ci".to_owned())])),
            env: Some(BTreeMap::from([("LANG".to_owned(), "C".to_owned())])),
            workdir: Some("/src".to_owned()),
            command: Some(CommandParam::Line("make all".to_owned())),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_from_args() {
        let spec = full_spec();
        let args = from(&spec, spec.image.as_deref().unwrap());
        assert_eq!(
            args,
            vec![
                "from",
                "--name",
                "ci",
                "--authfile",
                "/run/auth.json",
                "--cap-add",
                "CAP_NET_RAW",
                "--cap-drop",
                "CAP_SYS_ADMIN",
                "--blkio-weight",
                "300",
                "--blkio-weight-device",
                "/dev/sda:200",
                "--cgroup-parent",
                "/machine.slice",
                "--cgroupns",
                "private",
                "--cgroups",
                "enabled",
                "--cidfile",
                "/tmp/ci.cid",
                "quay.io/rockylinux/rockylinux:8",
            ]
        );
    }

    #[test]
    fn test_create_config_args() {
        let args = create_config(&full_spec()).unwrap();
        assert_eq!(args.first().map(String::as_str), Some("config"));
        assert_eq!(args.last().map(String::as_str), Some("ci"));
        assert!(args.contains(&"owner=ci".to_owned()));
        assert!(args.contains(&"LANG=C".to_owned()));
        assert!(args.contains(&"/src".to_owned()));
        assert!(args.contains(&r#"["make","all"]"#.to_owned()));
        assert!(args
            .iter()
            .any(|arg| arg.starts_with(&format!("{CREATE_RECORD_ANNOTATION}="))));
    }

    #[test]
    fn test_update_args() {
        let patch = Patch::Env(BTreeMap::from([
            ("A".to_owned(), "1".to_owned()),
            ("B".to_owned(), "two words".to_owned()),
        ]));
        assert_eq!(
            update("c1", &patch).unwrap(),
            vec!["config", "--env", "A=1", "--env", "B=two words", "c1"]
        );
        assert_eq!(
            update("c1", &Patch::Workdir("/srv".to_owned())).unwrap(),
            vec!["config", "--workingdir", "/srv", "c1"]
        );
    }

    #[test]
    fn test_render_quotes_arguments() {
        let args = to_strings(["config", "--env", "B=two words", "c1"]);
        let rendered = render(Path::new("buildah"), &args);
        assert_ne!(rendered, "buildah config --env B=two words c1");
        assert_eq!(
            shlex::split(&rendered).unwrap(),
            vec!["buildah", "config", "--env", "B=two words", "c1"]
        );
        assert_eq!(
            render(Path::new("/usr/bin/buildah"), &remove("c1")),
            "/usr/bin/buildah rm c1"
        );
    }
}
