use anyhow::{Context, Result};
use libbuildah::config::DEFAULT_PODMAN_EXECUTABLE;
use libbuildah::runtime::{BuildahRuntime, Runtime};
use libbuildah_cli::Inspect;

use crate::commands::print_json;

pub fn inspect(args: Inspect) -> Result<()> {
    let runtime = BuildahRuntime::new(&args.executable, DEFAULT_PODMAN_EXECUTABLE);
    let snapshot = runtime
        .inspect(&args.name)
        .with_context(|| format!("failed to inspect container {}", args.name))?;
    print_json(std::io::stdout().lock(), &snapshot.to_value())
}
