//! Safety utilities to prevent overwriting the source corpus.
//!
//! Every writer checks its output path against the source locations before
//! truncating it, since the slices and the challenge set are not reproducible.

use anyhow::{bail, Result};
use std::path::Path;

use crate::settings::{CHALLENGE_SET_FILE_NAME, SLICE_PREFIX, SLICE_SUFFIX};

/// Returns true if `name` follows the MPD slice naming convention.
pub fn is_slice_file_name(name: &str) -> bool {
    name.starts_with(SLICE_PREFIX) && name.ends_with(SLICE_SUFFIX)
}

/// Validates that an output path is safe to overwrite.
///
/// Checks:
/// - Output filename must not look like a source slice or the challenge set
/// - Output cannot be one of the source paths
/// - Output cannot be written directly into a source directory
pub fn validate_output_path(output: &Path, sources: &[&Path]) -> Result<()> {
    let output_name = output.file_name().and_then(|n| n.to_str()).unwrap_or("");

    if output_name.is_empty() {
        bail!(
            "Safety check failed: output '{}' has no file name",
            output.display()
        );
    }

    if is_slice_file_name(output_name) || output_name == CHALLENGE_SET_FILE_NAME {
        bail!(
            "Safety check failed: output '{}' matches a source file name",
            output.display()
        );
    }

    for source in sources {
        if output == *source {
            bail!(
                "Safety check failed: output '{}' cannot be the same as source '{}'",
                output.display(),
                source.display()
            );
        }
        if output.parent() == Some(*source) {
            bail!(
                "Safety check failed: output '{}' cannot be written inside source directory '{}'",
                output.display(),
                source.display()
            );
        }
    }

    Ok(())
}
