//! Rebuilds the `document_chunks` table from a directory of `.txt` files,
//! one chunk per non-empty line.

use std::path::{Path, PathBuf};

use db::{DBService, models::document_chunk::DocumentChunk};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;

use super::ollama::Embedder;

#[derive(Debug, Error)]
pub enum DocumentImportError {
    #[error("cannot read documents directory {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct ImportReport {
    pub files: usize,
    pub chunks_imported: usize,
    pub chunks_failed: usize,
}

/// `.txt` files directly under `dir`, sorted by name
async fn text_files(dir: &Path) -> Result<Vec<PathBuf>, DocumentImportError> {
    let io_err = |source| DocumentImportError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "txt") && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Replace every stored chunk with freshly embedded lines from `dir`.
/// Lines that fail to embed or insert are counted, not fatal.
pub async fn import_documents(
    db: &DBService,
    embedder: &dyn Embedder,
    dir: &Path,
) -> Result<ImportReport, DocumentImportError> {
    // List first so an unreadable directory leaves the existing chunks alone
    let files = text_files(dir).await?;

    let removed = DocumentChunk::delete_all(&db.pool).await?;
    info!(removed, files = files.len(), dir = %dir.display(), "importing documents");

    let mut report = ImportReport::default();
    for path in files {
        let source_file = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) => {
                warn!(file = %source_file, error = %e, "skipping unreadable document");
                continue;
            }
        };
        report.files += 1;

        for line in text.split('\n').map(str::trim).filter(|l| !l.is_empty()) {
            let embedding = match embedder.embed(line).await {
                Ok(embedding) => embedding,
                Err(e) => {
                    warn!(file = %source_file, error = %e, "failed to embed chunk");
                    report.chunks_failed += 1;
                    continue;
                }
            };
            match DocumentChunk::create(&db.pool, line, &embedding, &source_file).await {
                Ok(_) => report.chunks_imported += 1,
                Err(e) => {
                    warn!(file = %source_file, error = %e, "failed to store chunk");
                    report.chunks_failed += 1;
                }
            }
        }
        info!(file = %source_file, "document imported");
    }

    info!(
        files = report.files,
        imported = report.chunks_imported,
        failed = report.chunks_failed,
        "document import finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::services::ollama::OllamaError;

    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f64>, OllamaError> {
            if text.contains("FAIL") {
                return Err(OllamaError::Transport("boom".into()));
            }
            Ok(vec![text.len() as f64, 1.0])
        }
    }

    #[tokio::test]
    async fn imports_non_empty_lines_and_replaces_old_chunks() {
        let db = DBService::new_in_memory().await.unwrap();
        DocumentChunk::create(&db.pool, "stale", &[1.0], "old.txt")
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "Cantine: 12h\r\n\n  \nFAIL here\n").unwrap();
        std::fs::write(dir.path().join("a.txt"), "Horaires: 8h-16h").unwrap();
        std::fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let report = import_documents(&db, &LengthEmbedder, dir.path())
            .await
            .unwrap();
        assert_eq!(
            report,
            ImportReport {
                files: 2,
                chunks_imported: 2,
                chunks_failed: 1,
            }
        );

        let chunks = DocumentChunk::find_all(&db.pool).await.unwrap();
        let stored: Vec<_> = chunks
            .iter()
            .map(|c| (c.source_file.as_str(), c.content.as_str()))
            .collect();
        assert_eq!(
            stored,
            vec![("a.txt", "Horaires: 8h-16h"), ("b.txt", "Cantine: 12h")]
        );
    }

    #[tokio::test]
    async fn missing_directory_keeps_existing_chunks() {
        let db = DBService::new_in_memory().await.unwrap();
        DocumentChunk::create(&db.pool, "keep", &[1.0], "old.txt")
            .await
            .unwrap();

        let err = import_documents(&db, &LengthEmbedder, Path::new("/definitely/not/here"))
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentImportError::Io { .. }));
        assert_eq!(DocumentChunk::count(&db.pool).await.unwrap(), 1);
    }
}
