// ── File storage contract ──
//
// Raw bytes by logical file name inside a namespace. The reference
// adapter maps `<root>/<namespace>/<name>` onto the local filesystem.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::Error;

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Read a file. `Ok(None)` when the file does not exist.
    async fn read_file(&self, namespace: &str, name: &str) -> Result<Option<Vec<u8>>, Error>;
}

/// Directory-backed [`FileStore`].
#[derive(Debug, Clone)]
pub struct DirFileStore {
    root: PathBuf,
}

impl DirFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, namespace: &str, name: &str) -> Result<PathBuf, Error> {
        let mut path = self.root.clone();
        for part in [namespace, name] {
            let rel = Path::new(part);
            if rel
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
            {
                return Err(Error::InvalidPath { name: part.into() });
            }
            path.push(rel);
        }
        Ok(path)
    }
}

#[async_trait]
impl FileStore for DirFileStore {
    async fn read_file(&self, namespace: &str, name: &str) -> Result<Option<Vec<u8>>, Error> {
        let path = self.resolve(namespace, name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!(path = %path.display(), len = bytes.len(), "read file");
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
