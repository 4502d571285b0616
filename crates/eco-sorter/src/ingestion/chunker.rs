//! Recursive character chunking with page and position tracking

use std::collections::VecDeque;
use unicode_segmentation::UnicodeSegmentation;

use super::parser::{PageContent, ParsedDocument};
use crate::types::{Chunk, Document};

/// Separators tried in order; the empty separator splits into graphemes
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Text chunker with configurable size and overlap, both in characters
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            overlap: overlap.min(chunk_size.saturating_sub(1)),
        }
    }

    /// Chunk a parsed document page by page
    pub fn chunk_document(&self, doc: &Document, parsed: &ParsedDocument) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for page in &parsed.pages {
            let page_number = parsed.total_pages.map(|_| page.page_number);
            self.chunk_page(doc, page, page_number, &mut chunks);
        }

        chunks
    }

    fn chunk_page(
        &self,
        doc: &Document,
        page: &PageContent,
        page_number: Option<u32>,
        out: &mut Vec<Chunk>,
    ) {
        let mut search_from = 0usize;
        let mut last_start = 0usize;

        for text in self.split_text(&page.content) {
            let char_start = match page.content[search_from..].find(text.as_str()) {
                Some(pos) => {
                    let byte_pos = search_from + pos;
                    search_from = byte_pos
                        + page.content[byte_pos..]
                            .chars()
                            .next()
                            .map(char::len_utf8)
                            .unwrap_or(0);
                    page.content[..byte_pos].chars().count()
                }
                None => last_start,
            };
            last_start = char_start;
            let char_end = char_start + text.chars().count();

            let index = out.len() as u32;
            out.push(Chunk::new(doc, text, page_number, char_start, char_end, index));
        }
    }

    /// Split text into chunks of at most `chunk_size` characters
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let remaining = separators.get(position + 1..).unwrap_or(&[]);

        let pieces: Vec<&str> = if separator.is_empty() {
            text.graphemes(true).collect()
        } else {
            text.split(separator).filter(|s| !s.is_empty()).collect()
        };

        let mut output = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for piece in pieces {
            if char_len(piece) <= self.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                output.extend(self.merge(&fitting, separator));
                fitting.clear();
            }

            if remaining.is_empty() {
                output.push(piece.to_string());
            } else {
                output.extend(self.split_recursive(piece, remaining));
            }
        }

        if !fitting.is_empty() {
            output.extend(self.merge(&fitting, separator));
        }

        output
    }

    /// Greedily merge pieces; each new chunk starts with the trailing pieces
    /// of the previous one, at most `overlap` characters of them
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joiner = if current.is_empty() { 0 } else { sep_len };

            if total + len + joiner > self.chunk_size && !current.is_empty() {
                push_joined(&mut chunks, &current, separator);

                while total > self.overlap
                    || (total > 0
                        && total + len + if current.is_empty() { 0 } else { sep_len }
                            > self.chunk_size)
                {
                    let Some(front) = current.pop_front() else {
                        break;
                    };
                    total -= char_len(front) + if current.is_empty() { 0 } else { sep_len };
                }
            }

            total += len + if current.is_empty() { 0 } else { sep_len };
            current.push_back(piece);
        }

        push_joined(&mut chunks, &current, separator);
        chunks
    }
}

fn push_joined(chunks: &mut Vec<String>, pieces: &VecDeque<&str>, separator: &str) {
    let joined = pieces
        .iter()
        .copied()
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Region;
    use crate::types::FileType;

    fn doc() -> Document {
        Document::new(
            "guide.pdf".to_string(),
            Region::Bruxelles,
            FileType::Pdf,
            "hash".to_string(),
            0,
        )
    }

    fn parsed(pages: &[&str]) -> ParsedDocument {
        ParsedDocument {
            file_type: FileType::Pdf,
            content_hash: "hash".to_string(),
            total_pages: Some(pages.len() as u32),
            pages: pages
                .iter()
                .enumerate()
                .map(|(i, p)| PageContent {
                    page_number: i as u32 + 1,
                    content: p.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunker = TextChunker::new(1000, 200);
        let chunks = chunker.split_text("Les canettes vont dans le sac bleu.");
        assert_eq!(chunks, vec!["Les canettes vont dans le sac bleu."]);
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        let chunker = TextChunker::new(100, 20);
        let text = (0..60)
            .map(|i| format!("mot{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunker.split_text(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100);
        }
        for pair in chunks.windows(2) {
            let last_word = pair[0].rsplit(' ').next().unwrap();
            assert!(pair[1].starts_with(last_word) || pair[1].contains(last_word));
        }
    }

    #[test]
    fn test_paragraphs_preferred_over_words() {
        let chunker = TextChunker::new(40, 0);
        let text = "Sac bleu : bouteilles en plastique.\n\nSac jaune : papiers et cartons.";
        let chunks = chunker.split_text(text);
        assert_eq!(
            chunks,
            vec!["Sac bleu : bouteilles en plastique.", "Sac jaune : papiers et cartons."]
        );
    }

    #[test]
    fn test_long_word_falls_back_to_graphemes() {
        let chunker = TextChunker::new(10, 2);
        let chunks = chunker.split_text(&"é".repeat(25));
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    }

    #[test]
    fn test_chunks_never_span_pages() {
        let chunker = TextChunker::new(1000, 200);
        let doc = doc();
        let chunks =
            chunker.chunk_document(&doc, &parsed(&["Page un : verre.", "Page deux : carton."]));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].page_number, Some(1));
        assert_eq!(chunks[1].page_number, Some(2));
        assert_eq!(chunks[1].chunk_index, 1);
        assert!(chunks.iter().all(|c| c.region == Region::Bruxelles));
        assert!(chunks.iter().all(|c| c.source == "guide.pdf"));
    }

    #[test]
    fn test_char_offsets_point_into_page() {
        let chunker = TextChunker::new(20, 5);
        let page = "Verre blanc et verre coloré vont aux bulles à verre.";
        let doc = doc();
        let chunks = chunker.chunk_document(&doc, &parsed(&[page]));

        let page_chars: Vec<char> = page.chars().collect();
        for chunk in &chunks {
            let slice: String = page_chars[chunk.char_start..chunk.char_end].iter().collect();
            assert_eq!(slice, chunk.content);
        }
    }
}
