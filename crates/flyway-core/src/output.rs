//! Output directory handling shared by the generator and the driver.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Creates `dir` if it is absent.
///
/// An existing directory is only accepted when `allow_overwrite` is set; asking the user is the
/// caller's business.
pub fn prepare_output_dir(dir: &Path, allow_overwrite: bool) -> Result<(), OutputDirError> {
    if dir.exists() {
        if !dir.is_dir() {
            return Err(OutputDirError::NotADirectory(dir.into()));
        }
        if !allow_overwrite {
            return Err(OutputDirError::Exists(dir.into()));
        }
        log::debug!("reusing existing output directory {}", dir.display());
        return Ok(());
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Writes `contents` to `path` through a temporary file in the same directory, so `path` either
/// holds the complete contents or is left untouched.
pub fn write_atomic(path: &Path, contents: impl AsRef<[u8]>) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_ref())?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Error preparing an output directory.
#[derive(Debug, thiserror::Error)]
pub enum OutputDirError {
    /// The directory exists and overwriting was not allowed.
    #[error("output directory {0} already exists")]
    Exists(PathBuf),

    /// The path exists but is not a directory.
    #[error("{0} exists and is not a directory")]
    NotADirectory(PathBuf),

    /// IO error.
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dir_is_created() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let dir = root.path().join("a/b");
        prepare_output_dir(&dir, false)?;
        assert!(dir.is_dir());
        Ok(())
    }

    #[test]
    fn existing_dir_needs_permission() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        assert!(matches!(
            prepare_output_dir(root.path(), false),
            Err(OutputDirError::Exists(_))
        ));
        prepare_output_dir(root.path(), true)?;
        Ok(())
    }

    #[test]
    fn file_is_not_a_directory() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let file = root.path().join("f");
        fs::write(&file, "x")?;
        assert!(matches!(
            prepare_output_dir(&file, true),
            Err(OutputDirError::NotADirectory(_))
        ));
        Ok(())
    }

    #[test]
    fn atomic_write_replaces_contents() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let path = root.path().join("out.dat");
        write_atomic(&path, "first")?;
        write_atomic(&path, "second")?;
        assert_eq!(fs::read_to_string(&path)?, "second");
        assert_eq!(fs::read_dir(root.path())?.count(), 1);
        Ok(())
    }
}
