use super::SessionStorage;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const SESSION_FILE: &str = ".session";

/// Get the ppghub config directory
pub(crate) fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .context("Failed to find config directory")?;
    Ok(config_dir.join("ppghub"))
}

/// Session slot kept in a single file, owner-readable only on Unix.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.config/ppghub/.session` (or the platform equivalent).
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(get_config_dir()?.join(SESSION_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).context("Failed to create session directory")?;
            }
        }
        Ok(())
    }
}

impl SessionStorage for FileStorage {
    fn read_slot(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path).context("Failed to read session file")?;
        tracing::debug!("Session slot loaded from file");
        Ok(Some(content))
    }

    fn write_slot(&self, contents: &str) -> Result<()> {
        self.ensure_parent()?;

        // Set restrictive permissions on Unix before writing
        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;
            let file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.path)
                .context("Failed to create session file")?;
            let mut file = std::io::BufWriter::new(file);
            file.write_all(contents.as_bytes())
                .context("Failed to write session file")?;
            file.flush().context("Failed to flush session file")?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&self.path, contents).context("Failed to write session file")?;
        }

        tracing::debug!("Session slot saved to file: {:?}", self.path);
        Ok(())
    }

    fn clear_slot(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).context("Failed to delete session file")?;
            tracing::debug!("Session file removed: {:?}", self.path);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("File-based storage: {}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nope"));
        assert_eq!(storage.read_slot().unwrap(), None);
        // Clearing a missing slot is fine
        storage.clear_slot().unwrap();
    }

    #[test]
    fn test_write_creates_parent_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested").join(".session"));

        storage.write_slot("first, and much longer").unwrap();
        storage.write_slot("second").unwrap();
        assert_eq!(storage.read_slot().unwrap().as_deref(), Some("second"));

        storage.clear_slot().unwrap();
        assert!(!storage.path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join(".session"));
        storage.write_slot("{}").unwrap();

        let mode = fs::metadata(storage.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
