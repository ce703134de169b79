use clap::Parser;
use std::path::PathBuf;

/// Print the current state of a container as JSON
#[derive(Parser, Debug)]
pub struct Inspect {
    #[clap(value_parser = clap::builder::NonEmptyStringValueParser::new(), required = true)]
    pub name: String,

    /// Path of the buildah binary
    #[clap(long, default_value = "buildah")]
    pub executable: PathBuf,
}
