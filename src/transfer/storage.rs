//! Received files and writing them to disk with collision-safe naming.

use anyhow::{Context, Result};
use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::utils::security::validate_file_name;

/// A fully reassembled file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl ReceivedFile {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Write into `dir` under the sender's file name, appending ` (N)` if the
    /// name is taken. Returns the path written.
    pub async fn save_into(&self, dir: &Path) -> Result<PathBuf> {
        validate_file_name(&self.name)
            .with_context(|| format!("Refusing to save file named {:?}", self.name))?;

        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;

        let path = find_available_path(dir.join(&self.name)).await;
        tokio::fs::write(&path, &self.data)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::info!(path = %path.display(), bytes = self.data.len(), "Saved received file");
        Ok(path)
    }
}

/// First free path among `name.ext`, `name (1).ext`, `name (2).ext`, ...
///
/// A name already ending in ` (N)` continues from `N + 1`. The check and the
/// later write are not atomic.
pub async fn find_available_path(path: PathBuf) -> PathBuf {
    if !exists(&path).await {
        return path;
    }

    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".into());
    let (stem, extensions) = split_extensions(&file_name);
    let (stem, first) = strip_counter(stem);

    let mut counter = first;
    loop {
        let candidate = dir.join(format!("{stem} ({counter}){extensions}"));
        if !exists(&candidate).await {
            return candidate;
        }
        counter += 1;
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Splits at the first dot so `a.tar.gz` keeps `.tar.gz`. Leading-dot names
/// have no extension.
fn split_extensions(file_name: &str) -> (&str, &str) {
    match file_name.char_indices().skip(1).find(|(_, c)| *c == '.') {
        Some((dot, _)) => file_name.split_at(dot),
        None => (file_name, ""),
    }
}

/// `"file (3)"` becomes `("file", 4)`; anything else starts at 1.
fn strip_counter(stem: &str) -> (&str, u32) {
    stem.strip_suffix(')')
        .and_then(|rest| rest.rsplit_once(" ("))
        .and_then(|(base, n)| n.parse::<u32>().ok().map(|n| (base, n + 1)))
        .unwrap_or((stem, 1))
}
