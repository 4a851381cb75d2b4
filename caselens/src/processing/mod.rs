mod chunker;
mod guidelines;

pub use chunker::{window_count, TextChunk, WindowChunker};
pub use guidelines::{clean_guideline_text, load_guideline_documents, read_guideline_files, GuidelineFile};
