use std::collections::BTreeMap;
use std::path::Path;
use std::{fs, io};

use anyhow::{bail, Context, Result};
use libbuildah::config::{CommandParam, ContainerParams};
use libbuildah::runtime::BuildahRuntime;
use libbuildah::{DesiredSpec, ReconcileError, ReconcileResult, State};
use libbuildah_cli::Reconcile;

use crate::commands::print_json;

pub fn reconcile(args: Reconcile) -> Result<()> {
    let params = load_params(args)?;
    let name = params.name.clone();
    let result = run(params);
    print_json(io::stdout().lock(), &result)?;
    if result.failed {
        bail!("reconciliation of container {name} failed");
    }
    Ok(())
}

/// Validates the parameters and reconciles against the real tooling
fn run(params: ContainerParams) -> ReconcileResult {
    let check_mode = params.check_mode;
    match DesiredSpec::from_params(params) {
        Ok(spec) => {
            let runtime = BuildahRuntime::from_spec(&spec);
            libbuildah::reconcile(&runtime, &spec, check_mode)
        }
        Err(err) => {
            let err = ReconcileError::from(err);
            tracing::error!(error = %err.report(), "rejected parameters");
            ReconcileResult::failure(&err)
        }
    }
}

fn load_params(args: Reconcile) -> Result<ContainerParams> {
    if let Some(path) = &args.params {
        return read_params(path);
    }
    from_flags(args)
}

/// Reads a JSON parameter document, `-` meaning stdin
fn read_params(path: &Path) -> Result<ContainerParams> {
    let params = if path.to_string_lossy() == "-" {
        serde_json::from_reader(io::stdin()).context("failed to parse parameters from stdin")?
    } else {
        let file = fs::File::open(path)
            .with_context(|| format!("failed to open parameter file {}", path.display()))?;
        let reader = io::BufReader::new(file);
        serde_json::from_reader(reader)
            .with_context(|| format!("failed to parse parameter file {}", path.display()))?
    };
    Ok(params)
}

fn from_flags(args: Reconcile) -> Result<ContainerParams> {
    let state = match args.state.as_deref() {
        Some(state) => state.parse::<State>()?,
        None => State::default(),
    };

    Ok(ContainerParams {
        name: args.name.unwrap_or_default(),
        state,
        image: args.image,
        annotation: non_empty(args.annotation),
        authfile: args.authfile,
        blkio_weight: args.blkio_weight,
        blkio_weight_device: non_empty(args.blkio_weight_device),
        cap_add: (!args.cap_add.is_empty()).then_some(args.cap_add),
        cap_drop: (!args.cap_drop.is_empty()).then_some(args.cap_drop),
        cgroup_parent: args.cgroup_parent,
        cgroupns: args.cgroupns,
        cgroups: args.cgroups,
        cidfile: args.cidfile,
        command: args.command.map(CommandParam::Line),
        debug: args.debug,
        env: non_empty(args.env),
        executable: args.executable,
        podman_executable: args.podman_executable,
        workdir: args.workdir,
        check_mode: args.check,
    })
}

fn non_empty<V>(pairs: Vec<(String, V)>) -> Option<BTreeMap<String, V>> {
    (!pairs.is_empty()).then(|| pairs.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use clap::Parser;

    use super::*;

    fn parse(args: &[&str]) -> Reconcile {
        Reconcile::try_parse_from(std::iter::once("reconcile").chain(args.iter().copied()))
            .expect("valid arguments")
    }

    #[test]
    fn test_params_from_flags() -> Result<()> {
        let params = load_params(parse(&[
            "--name",
            "c1",
            "--image",
            "img:latest",
            "--state",
            "created",
            "--env",
            "LANG=C",
            "--cap-drop",
            "sys_admin",
            "--command",
            "sleep 10",
            "--check",
        ]))?;
        assert_eq!(params.name, "c1");
        assert_eq!(params.state, State::Created);
        assert_eq!(
            params.env,
            Some(BTreeMap::from([("LANG".to_owned(), "C".to_owned())]))
        );
        assert_eq!(params.cap_add, None);
        assert_eq!(params.cap_drop, Some(vec!["sys_admin".to_owned()]));
        assert_eq!(
            params.command,
            Some(CommandParam::Line("sleep 10".to_owned()))
        );
        assert!(params.check_mode);
        assert_eq!(params.executable, None);
        Ok(())
    }

    #[test]
    fn test_params_from_file() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(
            file,
            r#"{{"name": "c1", "image": "img", "capabilities": ["net_raw"], "check_mode": true}}"#
        )?;
        let params = load_params(parse(&["--params", &file.path().to_string_lossy()]))?;
        assert_eq!(params.name, "c1");
        assert_eq!(params.cap_add, Some(vec!["net_raw".to_owned()]));
        assert!(params.check_mode);
        Ok(())
    }

    #[test]
    fn test_missing_params_file() {
        let err = read_params(&PathBuf::from("/nonexistent/params.json")).unwrap_err();
        assert!(err.to_string().contains("failed to open parameter file"));
    }

    #[test]
    fn test_invalid_params_fail_without_tooling() {
        let result = run(ContainerParams {
            name: "c1".to_owned(),
            executable: Some(PathBuf::from("/nonexistent/buildah")),
            ..Default::default()
        });
        assert!(result.failed);
        assert!(!result.changed);
        assert!(result.error.unwrap().contains("requires image"));
    }

    #[test]
    fn test_check_mode_against_missing_tool_fails_inspection() {
        let result = run(ContainerParams {
            name: "c1".to_owned(),
            image: Some("img".to_owned()),
            executable: Some(PathBuf::from("/nonexistent/buildah")),
            check_mode: true,
            ..Default::default()
        });
        assert!(result.failed);
        assert!(result
            .error
            .unwrap()
            .starts_with("failed to inspect container c1"));
    }
}
