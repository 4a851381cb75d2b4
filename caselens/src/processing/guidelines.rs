use std::path::Path;
use tracing::{debug, warn};

use super::WindowChunker;
use crate::error::Result;
use crate::models::Document;

#[derive(Debug, Clone, PartialEq)]
pub struct GuidelineFile {
    /// File name, used as the `source` of every chunk.
    pub source: String,
    pub text: String,
}

/// Guideline text as indexed: surrounding whitespace removed, inner text
/// untouched so chunk offsets map back onto the file.
pub fn clean_guideline_text(raw: &str) -> String {
    raw.trim().to_string()
}

/// Reads `*.txt` files from `dir` in name order. Empty files are skipped and
/// a missing directory yields no files.
pub fn read_guideline_files(dir: &Path) -> Result<Vec<GuidelineFile>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(dir = %dir.display(), "Guidelines directory not found");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut paths: Vec<_> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let text = clean_guideline_text(&std::fs::read_to_string(&path)?);
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if text.is_empty() {
            debug!(source = %source, "Skipping empty guideline file");
            continue;
        }
        files.push(GuidelineFile { source, text });
    }
    Ok(files)
}

/// Chunks every guideline file into guideline documents.
pub fn load_guideline_documents(dir: &Path, chunker: &WindowChunker) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    for file in read_guideline_files(dir)? {
        let chunks = chunker.chunk(&file.text);
        debug!(source = %file.source, chunks = chunks.len(), "Chunked guideline");
        documents.extend(
            chunks
                .into_iter()
                .map(|chunk| Document::guideline(&file.source, chunk.chunk_id, chunk.content)),
        );
    }
    Ok(documents)
}
