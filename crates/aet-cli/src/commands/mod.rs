//! CLI subcommand implementations.

pub mod drift;
pub mod zones;

use anyhow::{Context, Result};

use aet_core::SourceId;

/// Validates the source paths given on the command line.
fn source_ids(paths: &[String]) -> Result<Vec<SourceId>> {
    paths
        .iter()
        .map(|path| SourceId::new(path.as_str()).with_context(|| format!("invalid source {path:?}")))
        .collect()
}
