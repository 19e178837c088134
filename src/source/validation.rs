//! Checks run on a path before it is opened for viewing.

use crate::error::{ColvError, Result};
use std::fs::File;
use std::path::Path;

/// Make sure `path` names a readable regular file.
///
/// Empty files are accepted: they open as an empty view.
pub fn validate_file_path(path: &Path) -> Result<()> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ColvError::FileNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(ColvError::file_error("Failed to read file metadata", e)),
    };

    if !metadata.is_file() {
        return Err(ColvError::NotAFile {
            path: path.to_path_buf(),
        });
    }

    File::open(path).map_err(|e| {
        ColvError::file_error(format!("Cannot open {} for reading", path.display()), e)
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn accepts_regular_files_including_empty() {
        let mut file = NamedTempFile::new().unwrap();
        assert!(validate_file_path(file.path()).is_ok());
        writeln!(file, "a b c").unwrap();
        assert!(validate_file_path(file.path()).is_ok());
    }

    #[test]
    fn rejects_missing_path() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.log");
        assert!(matches!(
            validate_file_path(&missing),
            Err(ColvError::FileNotFound { .. })
        ));
    }

    #[test]
    fn rejects_directories() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            validate_file_path(dir.path()),
            Err(ColvError::NotAFile { .. })
        ));
    }
}
