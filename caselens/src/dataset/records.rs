use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{CaseLensError, Result};
use crate::models::Document;

/// Reads a JSON-lines document store. Blank lines are ignored; a malformed
/// line fails the whole read with its line number.
pub fn read_documents(path: &Path) -> Result<Vec<Document>> {
    let reader = BufReader::new(File::open(path)?);
    let mut documents = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let document: Document = serde_json::from_str(&line).map_err(|e| {
            CaseLensError::Validation(format!("{}:{}: {e}", path.display(), i + 1))
        })?;
        documents.push(document);
    }
    Ok(documents)
}

/// Writes documents as JSON lines, replacing the file.
pub fn write_documents(path: &Path, documents: &[Document]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    for document in documents {
        serde_json::to_writer(&mut writer, document)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
