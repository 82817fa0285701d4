//! Output directory cleaner

use std::fs;
use std::io;
use std::path::Path;

use super::BuildError;

/// Deletes `out_dir` recursively and recreates it empty
pub fn clean(out_dir: &Path) -> Result<(), BuildError> {
    match fs::remove_dir_all(out_dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(BuildError::io(
                format!("Failed to remove output directory {}", out_dir.display()),
                e,
            ))
        }
    }

    fs::create_dir_all(out_dir).map_err(|e| {
        BuildError::io(
            format!("Failed to create output directory {}", out_dir.display()),
            e,
        )
    })
}
