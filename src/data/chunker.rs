// ============================================================
// Layer 4 — Text Chunker
// ============================================================
// Splits long passages into overlapping windows of words.
//
// The passage curation strategy turns each window into one
// instruction/response record, so a window must be short enough
// to fit the model's context after tokenisation. Overlap keeps
// sentences that straddle a boundary whole in at least one window.
//
// Example with chunk_size=5, overlap=2 (stride 3):
//   Document: "A B C D E F G H I J"
//   Chunk 1:  "A B C D E"
//   Chunk 2:  "D E F G H"
//   Chunk 3:  "G H I J"
//
// Reference: Rust Book §8 (Slices)

pub struct Chunker {
    chunk_size: usize,
    overlap:    usize,
}

impl Chunker {
    /// # Panics
    /// Panics if overlap >= chunk_size (the stride would be zero).
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        assert!(
            overlap < chunk_size,
            "overlap ({}) must be less than chunk_size ({})",
            overlap,
            chunk_size
        );
        Self { chunk_size, overlap }
    }

    fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::with_capacity(self.num_chunks(words.len()));
        let mut start = 0usize;
        loop {
            let end = (start + self.chunk_size).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end == words.len() {
                break;
            }
            start += self.stride();
        }
        chunks
    }

    /// How many chunks a text of `word_count` words produces.
    pub fn num_chunks(&self, word_count: usize) -> usize {
        if word_count == 0 {
            return 0;
        }
        if word_count <= self.chunk_size {
            return 1;
        }
        let remaining = word_count - self.chunk_size;
        1 + (remaining + self.stride() - 1) / self.stride()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_chunking() {
        let c = Chunker::new(5, 2);
        let chunks = c.chunk("a b c d e f g h i j");
        assert_eq!(chunks, vec!["a b c d e", "d e f g h", "g h i j"]);
    }

    #[test]
    fn test_num_chunks_matches_chunk() {
        let c = Chunker::new(4, 1);
        for n in 0..20 {
            let text = vec!["w"; n].join(" ");
            assert_eq!(c.chunk(&text).len(), c.num_chunks(n), "n = {n}");
        }
    }

    #[test]
    fn test_short_text_gives_one_chunk() {
        let c = Chunker::new(100, 10);
        assert_eq!(c.chunk("just a few words"), vec!["just a few words"]);
    }

    #[test]
    fn test_empty_text_gives_no_chunks() {
        let c = Chunker::new(5, 2);
        assert!(c.chunk("   ").is_empty());
    }

    #[test]
    #[should_panic]
    fn test_overlap_must_be_less_than_chunk_size() {
        let _ = Chunker::new(5, 5);
    }
}
