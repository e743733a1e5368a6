//! Resource root — maps a requested name and image type to a file on disk.

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use itp_core::ImageType;

/// Read-only view of the directory images are served from.
#[derive(Debug, Clone)]
pub struct ResourceRoot {
    root: PathBuf,
}

impl ResourceRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Candidate path `root/<name>.<EXT>`.
    ///
    /// `None` when the type has no extension or the name could escape the
    /// root (separators, `.`/`..`, NUL).
    pub fn resolve(&self, name: &str, img_type: ImageType) -> Option<PathBuf> {
        let ext = img_type.server_extension()?;
        if !is_plain_name(name) {
            return None;
        }
        Some(self.root.join(format!("{name}.{ext}")))
    }

    /// Read the resource. `Ok(None)` when it cannot be resolved or does not exist.
    pub async fn load(&self, name: &str, img_type: ImageType) -> io::Result<Option<Bytes>> {
        let Some(path) = self.resolve(name, img_type) else {
            return Ok(None);
        };
        match tokio::fs::read(&path).await {
            Ok(data) => {
                tracing::debug!(path = %path.display(), bytes = data.len(), "resource loaded");
                Ok(Some(Bytes::from(data)))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "resource not found");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
