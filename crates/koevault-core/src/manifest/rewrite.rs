//! Manifest rewriting for training-tool consumption.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::{KoevaultError, Result};

/// Rewrite a session manifest so its paths point into `target_folder` and
/// each line carries the speaker and language columns a training pipeline
/// expects.
///
/// Every `path|transcript` input line becomes
/// `<target_folder>/<file name>|<character_id>|<language>|<transcript>`.
/// Blank and malformed lines (no `|` delimiter) are skipped. The rewritten
/// manifest is written into `target_folder` under the input file's name and
/// its path is returned.
pub fn rewrite_manifest(
    manifest_path: &Path,
    target_folder: &Path,
    character_id: i64,
    language: &str,
) -> Result<PathBuf> {
    let content = std::fs::read_to_string(manifest_path)
        .map_err(|e| KoevaultError::io_with_path(e, manifest_path))?;

    std::fs::create_dir_all(target_folder)
        .map_err(|e| KoevaultError::io_with_path(e, target_folder))?;

    let mut rewritten = Vec::new();
    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let Some((original_path, transcript)) = line.split_once('|') else {
            warn!("Skipping malformed manifest line: {}", line);
            continue;
        };
        let Some(file_name) = Path::new(original_path).file_name() else {
            warn!("Skipping manifest line without a file name: {}", line);
            continue;
        };

        let new_path = target_folder.join(file_name);
        rewritten.push(format!(
            "{}|{}|{}|{}",
            new_path.display(),
            character_id,
            language,
            transcript
        ));
    }

    let file_name = manifest_path
        .file_name()
        .ok_or_else(|| KoevaultError::Config {
            message: format!(
                "Manifest path {} has no file name",
                manifest_path.display()
            ),
        })?;
    let output_path = target_folder.join(file_name);

    let mut body = rewritten.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }
    std::fs::write(&output_path, body)
        .map_err(|e| KoevaultError::io_with_path(e, &output_path))?;

    info!(
        "Wrote {} rewritten lines to {}",
        rewritten.len(),
        output_path.display()
    );
    Ok(output_path)
}
