use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Invalid file name: {0:?}")]
    InvalidName(String),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Host capability for saving a downloaded artifact somewhere the user can
/// reach it.
pub trait BlobSink {
    fn save(&self, name: &str, content: &[u8]) -> Result<PathBuf, SaveError>;
}

/// Saves blobs into a fixed directory.
///
/// Content is written to a hidden `.part` file first and renamed into place,
/// so a failed write never leaves a partial file under the final name.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_atomic(&self, target: &Path, temp: &Path, content: &[u8]) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut file = File::create(temp)?;
        file.write_all(content)?;
        file.sync_all()?;
        fs::rename(temp, target)
    }
}

impl BlobSink for DirectorySink {
    fn save(&self, name: &str, content: &[u8]) -> Result<PathBuf, SaveError> {
        let name = name.trim();
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\'])
        {
            return Err(SaveError::InvalidName(name.to_string()));
        }

        let target = self.dir.join(name);
        let temp = self.dir.join(format!(".{}.part", name));
        debug!(path = %target.display(), size = content.len(), "Saving download");

        if let Err(source) = self.write_atomic(&target, &temp, content) {
            if temp.exists() {
                if let Err(e) = fs::remove_file(&temp) {
                    warn!(path = %temp.display(), error = %e, "Failed to remove partial download");
                }
            }
            return Err(SaveError::Io {
                path: target,
                source,
            });
        }
        Ok(target)
    }
}
