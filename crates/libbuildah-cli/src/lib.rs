use std::path::PathBuf;

use clap::Parser;

mod inspect;
mod reconcile;

pub use inspect::Inspect;
pub use reconcile::Reconcile;

/// Subcommands of the reconciler
#[derive(Parser, Debug)]
pub enum ContainerCmd {
    Reconcile(Reconcile),
    Inspect(Inspect),
}

// Logging flags shared by every subcommand. stdout is reserved for results,
// so logs go to stderr unless a file is given.
#[derive(Parser, Debug)]
pub struct GlobalOpts {
    /// set the log file to write logs to (default is '/dev/stderr')
    #[clap(short, long, overrides_with("log"))]
    pub log: Option<PathBuf>,
    /// set the log format ('text' (default), or 'json')
    #[clap(long)]
    pub log_format: Option<String>,
    /// set the log level (error, warn, info, debug or trace)
    #[clap(long)]
    pub log_level: Option<String>,
}
