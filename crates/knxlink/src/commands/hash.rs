//! Project file content hash.

use std::path::Path;

use serde::Serialize;

use knxlink_core::content_hash;

use crate::cli::OutputFormat;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct FileHash {
    file: String,
    sha256: String,
}

pub async fn handle(file: &Path, format: OutputFormat, quiet: bool) -> Result<(), CliError> {
    let bytes = tokio::fs::read(file).await?;
    let hash = FileHash {
        file: file.display().to_string(),
        sha256: content_hash(&bytes),
    };

    let out = output::render_single(
        format,
        &hash,
        |h| format!("{}  {}", h.sha256, h.file),
        |h| h.sha256.clone(),
    );
    output::print_output(&out, quiet);
    Ok(())
}
