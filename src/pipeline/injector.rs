//! Writes asset references into copied pages

use std::fs;
use std::path::Path;

use super::{AssetManifest, BuildError};
use crate::domain::{inject_all, relative_href};

/// Injects the manifest into each page; returns how many files changed
///
/// `pages` are relative to `out_dir`. A page is only rewritten when its
/// content differs, so repeated injection leaves mtimes alone.
pub fn inject_pages<'a>(
    out_dir: &Path,
    pages: impl IntoIterator<Item = &'a Path>,
    manifest: &AssetManifest,
) -> Result<usize, BuildError> {
    let mut changed = 0;

    for page in pages {
        let path = out_dir.join(page);
        let markup = fs::read_to_string(&path)
            .map_err(|e| BuildError::io(format!("Failed to read page {}", path.display()), e))?;

        let styles: Vec<String> = manifest
            .style_paths()
            .into_iter()
            .map(|asset| relative_href(page, asset))
            .collect();
        let scripts: Vec<String> = manifest
            .script_paths()
            .into_iter()
            .map(|asset| relative_href(page, asset))
            .collect();

        let injected = inject_all(&markup, &styles, &scripts);
        if injected != markup {
            fs::write(&path, injected)
                .map_err(|e| BuildError::io(format!("Failed to write page {}", path.display()), e))?;
            changed += 1;
        }
    }

    Ok(changed)
}
