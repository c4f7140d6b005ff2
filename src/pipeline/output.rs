use std::{collections::HashSet, path::Path};

use serde::Serialize;
use serde_json::{ser::PrettyFormatter, Serializer};

use crate::error::{CommandResult, EnricherError};
use crate::pipeline::models::EnrichmentResult;

/// Overwrites `path` with `results` as indented JSON, creating parent directories.
pub async fn write_results(path: &Path, results: &[EnrichmentResult]) -> CommandResult<()> {
    let output_err = |source| EnricherError::Output {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(output_err)?;
    }

    let mut buffer = Vec::new();
    let mut serializer =
        Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"  "));
    results.serialize(&mut serializer)?;
    buffer.push(b'\n');

    tokio::fs::write(path, buffer).await.map_err(output_err)?;
    tracing::info!(count = results.len(), path = %path.display(), "results written");
    Ok(())
}

/// Results from a previous run. Missing or unreadable files count as empty.
pub async fn load_previous(path: &Path) -> Vec<EnrichmentResult> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no previous results");
            return Vec::new();
        }
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "could not read previous results, treating all messages as new");
            return Vec::new();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(results) => results,
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "could not parse previous results, treating all messages as new");
            Vec::new()
        }
    }
}

pub fn successful_ids(results: &[EnrichmentResult]) -> HashSet<u64> {
    results
        .iter()
        .filter(|result| result.success)
        .map(|result| result.id)
        .collect()
}
