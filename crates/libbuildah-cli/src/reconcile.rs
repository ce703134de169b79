use std::error::Error;
use std::path::PathBuf;

use clap::Parser;

/// Bring a container to the requested state and print the result as JSON
#[derive(Parser, Debug)]
pub struct Reconcile {
    /// Read all parameters from the given json file. Use - to read from stdin.
    /// If this option is used, all other options are ignored.
    #[clap(short, long)]
    pub params: Option<PathBuf>,

    /// Name of the container
    #[clap(long, required_unless_present = "params")]
    pub name: Option<String>,
    /// Image the container is built from
    #[clap(long)]
    pub image: Option<String>,
    /// Target state of the container
    #[clap(long, value_parser = ["present", "absent", "created"])]
    pub state: Option<String>,
    /// Capability to add, can be given multiple times
    #[clap(long, number_of_values = 1)]
    pub cap_add: Vec<String>,
    /// Capability to drop, can be given multiple times
    #[clap(long, number_of_values = 1)]
    pub cap_drop: Vec<String>,
    /// Annotation to set, as KEY=VALUE
    #[clap(long, value_parser = parse_key_val::<String, String>, number_of_values = 1)]
    pub annotation: Vec<(String, String)>,
    /// Environment variable to set, as KEY=VALUE
    #[clap(short, long, value_parser = parse_key_val::<String, String>, number_of_values = 1)]
    pub env: Vec<(String, String)>,
    /// Relative block IO weight (10 to 1000)
    #[clap(long)]
    pub blkio_weight: Option<u16>,
    /// Block IO weight of one device, as DEVICE=WEIGHT
    #[clap(long, value_parser = parse_key_val::<String, u16>, number_of_values = 1)]
    pub blkio_weight_device: Vec<(String, u16)>,
    /// Path of the cgroup the container is placed under
    #[clap(long)]
    pub cgroup_parent: Option<String>,
    /// Cgroup namespace to use ('host', 'private' or a path)
    #[clap(long)]
    pub cgroupns: Option<String>,
    /// Whether the container gets its own cgroups
    #[clap(long, value_parser = ["enabled", "disabled"])]
    pub cgroups: Option<String>,
    /// File to write the container ID to
    #[clap(long)]
    pub cidfile: Option<PathBuf>,
    /// Default command of the container, split like a shell would
    #[clap(long)]
    pub command: Option<String>,
    /// Registry authentication file used to pull the image
    #[clap(long)]
    pub authfile: Option<PathBuf>,
    /// Working directory of the container
    #[clap(long)]
    pub workdir: Option<String>,
    /// Path of the buildah binary
    #[clap(long)]
    pub executable: Option<PathBuf>,
    /// Path of the podman binary, used to resolve image IDs
    #[clap(long)]
    pub podman_executable: Option<PathBuf>,
    /// Include the executed command lines in the result
    #[clap(long)]
    pub debug: bool,
    /// Only report what would change
    #[clap(long)]
    pub check: bool,
}

fn parse_key_val<T, U>(s: &str) -> Result<(T, U), Box<dyn Error + Send + Sync + 'static>>
where
    T: std::str::FromStr,
    T::Err: Error + Send + Sync + 'static,
    U: std::str::FromStr,
    U::Err: Error + Send + Sync + 'static,
{
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=value: no `=` found in `{s}`"))?;
    Ok((s[..pos].parse()?, s[pos + 1..].parse()?))
}
