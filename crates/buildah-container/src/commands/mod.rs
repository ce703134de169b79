use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

pub mod inspect;
pub mod reconcile;

/// Writes `value` to `out` as pretty printed JSON followed by a newline
fn print_json<W: Write, T: Serialize>(mut out: W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut out, value).context("failed to serialize result")?;
    writeln!(out).context("failed to write result")?;
    Ok(())
}
