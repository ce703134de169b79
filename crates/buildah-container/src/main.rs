//! # buildah-container
//! Keeps a buildah working container in line with a declared configuration.
//! Each run inspects the container, works out the smallest change that
//! converges it, applies that change and prints the outcome as JSON.
mod commands;
mod observability;

use anyhow::Result;
use clap::{crate_version, Parser};

use libbuildah_cli::{ContainerCmd, GlobalOpts};

// High-level commandline option definition
#[derive(Parser, Debug)]
#[clap(version = crate_version!(), author = env!("CARGO_PKG_AUTHORS"))]
struct Opts {
    #[clap(flatten)]
    global: GlobalOpts,

    #[clap(subcommand)]
    subcmd: SubCommand,
}

#[derive(Parser, Debug)]
enum SubCommand {
    #[clap(flatten)]
    Container(ContainerCmd),
}

/// Parses the flags, sets up logging and runs the requested subcommand.
/// Results go to stdout, logs to stderr or the log file.
fn main() -> Result<()> {
    let opts = Opts::parse();

    if let Err(e) = observability::init(&opts) {
        eprintln!("log init failed: {e:?}");
    }

    tracing::debug!(args = ?std::env::args_os().collect::<Vec<_>>(), "started");

    match opts.subcmd {
        SubCommand::Container(cmd) => match cmd {
            ContainerCmd::Reconcile(reconcile) => commands::reconcile::reconcile(reconcile),
            ContainerCmd::Inspect(inspect) => commands::inspect::inspect(inspect),
        },
    }
}
