use crate::config::IndexingConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// Position of the chunk within its source, starting at 0.
    pub chunk_id: usize,
    pub content: String,
    /// Character offset of the first character in the source text.
    pub start: usize,
}

/// Fixed-size character windows. Window `i` starts at `i * (size - overlap)`;
/// windows are produced while the start lies inside the text.
pub struct WindowChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl WindowChunker {
    pub fn new(config: &IndexingConfig) -> Self {
        Self::with_sizes(config.chunk_size, config.chunk_overlap)
    }

    pub fn with_sizes(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    fn stride(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }

    /// Splits `text` into windows counted in chars.
    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        let chars: Vec<char> = text.chars().collect();
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            chunks.push(TextChunk {
                chunk_id: chunks.len(),
                content: chars[start..end].iter().collect(),
                start,
            });
            start += self.stride();
        }
        chunks
    }
}

/// Number of windows [`WindowChunker`] produces for a text of `len` characters.
pub fn window_count(len: usize, chunk_size: usize, chunk_overlap: usize) -> usize {
    let chunk_size = chunk_size.max(1);
    let stride = chunk_size - chunk_overlap.min(chunk_size - 1);
    len.div_ceil(stride)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_has_no_chunks() {
        let chunker = WindowChunker::with_sizes(800, 150);
        assert!(chunker.chunk("").is_empty());
    }

    #[test]
    fn test_windows_overlap() {
        let chunker = WindowChunker::with_sizes(4, 1);
        let chunks = chunker.chunk("abcdefghij");
        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["abcd", "defg", "ghij", "j"]);
        assert_eq!(chunks.iter().map(|c| c.chunk_id).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert_eq!(chunks[2].start, 6);
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunker = WindowChunker::with_sizes(800, 150);
        let chunks = chunker.chunk("Short guideline.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Short guideline.");
    }

    #[test]
    fn test_windows_count_characters_not_bytes() {
        let chunker = WindowChunker::with_sizes(3, 0);
        let chunks = chunker.chunk("ÄÖÜäöü");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].content, "äöü");
    }

    #[test]
    fn test_window_count_matches_chunker() {
        for len in [0usize, 1, 649, 650, 651, 800, 1300, 1301, 5000] {
            let text = "x".repeat(len);
            let produced = WindowChunker::with_sizes(800, 150).chunk(&text).len();
            assert_eq!(produced, window_count(len, 800, 150), "len={len}");
        }
    }

    #[test]
    fn test_overlap_is_clamped_below_size() {
        let chunker = WindowChunker::with_sizes(5, 10);
        assert_eq!(chunker.chunk("abcdefg").len(), 7);
    }
}
