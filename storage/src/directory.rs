use std::path::{Path, PathBuf};

use log::{debug, warn};
use tokio::{fs, io::AsyncWriteExt};

use crate::{BackendError, GroupBackend, StoredDocument};

const DOCUMENT_EXTENSION: &str = "json";

/// Local directory store: one `<group id>.json` file per group.
#[derive(Clone, Debug)]
pub struct DirectoryBackend {
    folder: PathBuf,
}

impl DirectoryBackend {
    /// Open the folder, creating it when it does not exist yet.
    pub async fn open(folder: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let folder = folder.into();
        fs::create_dir_all(&folder).await?;
        Ok(DirectoryBackend { folder })
    }

    /// Path of the document for `id`.
    pub fn document_path(&self, id: &str) -> Result<PathBuf, BackendError> {
        if id.is_empty() || id.starts_with('.') || id.contains(['/', '\\']) {
            return Err(BackendError::InvalidId(id.to_string()));
        }
        Ok(self.folder.join(format!("{id}.{DOCUMENT_EXTENSION}")))
    }
}

impl GroupBackend for DirectoryBackend {
    async fn load_all(&self) -> Result<Vec<StoredDocument>, BackendError> {
        let mut paths = Vec::new();
        let mut entries = fs::read_dir(&self.folder).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(DOCUMENT_EXTENSION) {
                continue;
            }
            if !entry.file_type().await?.is_file() {
                warn!("Skipping non-file entry {}", path.display());
                continue;
            }
            paths.push(path);
        }
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            documents.push(StoredDocument {
                id: document_id(&path),
                document: read_document(&path).await,
            });
        }
        Ok(documents)
    }

    async fn save(&self, id: &str, document: String) -> Result<(), BackendError> {
        let path = self.document_path(id)?;
        // Readers only ever see a complete, flushed document.
        let tmp = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(document.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, &path).await?;
        debug!("Wrote {}", path.display());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), BackendError> {
        let path = self.document_path(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn document_id(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

async fn read_document(path: &Path) -> Result<String, BackendError> {
    let bytes = fs::read(path).await?;
    String::from_utf8(bytes).map_err(|_| BackendError::NotUtf8(path.display().to_string()))
}
