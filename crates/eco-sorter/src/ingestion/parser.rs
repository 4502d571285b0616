//! Guide parser: PDF (page by page), plain text and Markdown

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::types::FileType;

/// Parsed guide with per-page text
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// File type
    pub file_type: FileType,
    /// SHA-256 of the raw file bytes
    pub content_hash: String,
    /// Total pages (if applicable)
    pub total_pages: Option<u32>,
    /// Non-empty pages, in document order
    pub pages: Vec<PageContent>,
}

impl ParsedDocument {
    /// Number of characters across all pages
    pub fn char_count(&self) -> usize {
        self.pages.iter().map(|p| p.content.chars().count()).sum()
    }
}

/// Content from a single page
#[derive(Debug, Clone)]
pub struct PageContent {
    /// Page number (1-indexed)
    pub page_number: u32,
    /// Normalised text of the page
    pub content: String,
}

/// Guide file parser
pub struct FileParser;

impl FileParser {
    /// Parse a file based on its extension
    pub fn parse(filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        let file_type = FileType::from_filename(filename);

        match file_type {
            FileType::Pdf => Self::parse_pdf(filename, data),
            FileType::Txt | FileType::Markdown => Self::parse_text(filename, data, file_type),
            FileType::Unknown => Err(Error::UnsupportedFileType(filename.to_string())),
        }
    }

    /// Parse a PDF, one passage per page
    fn parse_pdf(filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        let (total_pages, mut pages) = match Self::extract_pdf_pages(data) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Per-page extraction failed for {}: {}", filename, e);
                (0, Vec::new())
            }
        };

        if pages.is_empty() {
            tracing::debug!("Falling back to whole-document extraction for {}", filename);
            let text = normalize_text(&Self::extract_pdf_with_timeout(filename, data)?);
            if !text.is_empty() {
                pages.push(PageContent {
                    page_number: 1,
                    content: text,
                });
            }
        }

        if pages.is_empty() {
            return Err(Error::file_parse(
                filename,
                "No text content could be extracted from PDF",
            ));
        }

        let total_pages = if total_pages > 0 {
            total_pages
        } else {
            pages.len() as u32
        };

        Ok(ParsedDocument {
            file_type: FileType::Pdf,
            content_hash: hash_bytes(data),
            total_pages: Some(total_pages),
            pages,
        })
    }

    /// Extract text page by page with lopdf
    fn extract_pdf_pages(data: &[u8]) -> Result<(u32, Vec<PageContent>)> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::file_parse("document.pdf", format!("Failed to load PDF: {}", e)))?;

        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        let mut pages = Vec::with_capacity(page_numbers.len());

        for page_number in &page_numbers {
            match doc.extract_text(&[*page_number]) {
                Ok(text) => {
                    let content = normalize_text(&text);
                    if !content.is_empty() {
                        pages.push(PageContent {
                            page_number: *page_number,
                            content,
                        });
                    }
                }
                Err(e) => {
                    tracing::debug!("Could not extract page {}: {}", page_number, e);
                }
            }
        }

        Ok((page_numbers.len() as u32, pages))
    }

    /// Whole-document extraction with pdf-extract, bounded so that a
    /// pathological font cannot hang ingestion
    fn extract_pdf_with_timeout(filename: &str, data: &[u8]) -> Result<String> {
        use std::sync::mpsc;
        use std::thread;
        use std::time::Duration;

        let data_vec = data.to_vec();
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let result = pdf_extract::extract_text_from_mem(&data_vec);
            let _ = tx.send(result);
        });

        match rx.recv_timeout(Duration::from_secs(60)) {
            Ok(Ok(text)) => {
                let _ = handle.join();
                Ok(text)
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(Error::file_parse(filename, e.to_string()))
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::error!("PDF extraction timeout after 60s for {}", filename);
                Err(Error::file_parse(filename, "PDF extraction timed out"))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                tracing::error!("PDF extraction thread crashed for {}", filename);
                Err(Error::file_parse(filename, "PDF extraction crashed"))
            }
        }
    }

    /// Parse plain text or markdown as a single page
    fn parse_text(filename: &str, data: &[u8], file_type: FileType) -> Result<ParsedDocument> {
        let content = normalize_text(&String::from_utf8_lossy(data));

        if content.is_empty() {
            return Err(Error::file_parse(filename, "File contains no text"));
        }

        Ok(ParsedDocument {
            file_type,
            content_hash: hash_bytes(data),
            total_pages: None,
            pages: vec![PageContent {
                page_number: 1,
                content,
            }],
        })
    }
}

/// Clean extracted text: drop NUL bytes, expand ligatures, collapse
/// whitespace runs. Paragraph breaks survive as a single blank line.
pub fn normalize_text(text: &str) -> String {
    let text = text
        .replace('\0', "")
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('\u{2026}', "...");

    let mut out = String::with_capacity(text.len());
    let mut pending_break = false;

    for line in text.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            pending_break = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push_str(if pending_break { "\n\n" } else { "\n" });
        }
        out.push_str(&line);
        pending_break = false;
    }

    out
}

/// Hash raw file bytes for deduplication
pub(crate) fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        let raw = "Sac  bleu :\t PMC\0\r\n\r\n\r\n\r\nLe ﬁlm plastique   va au sac blanc. ";
        assert_eq!(
            normalize_text(raw),
            "Sac bleu : PMC\n\nLe film plastique va au sac blanc."
        );
    }

    #[test]
    fn test_parse_text_is_single_page() {
        let parsed =
            FileParser::parse("guide.md", "# Verre\n\nBulles à verre.".as_bytes()).unwrap();
        assert_eq!(parsed.file_type, FileType::Markdown);
        assert_eq!(parsed.pages.len(), 1);
        assert_eq!(parsed.pages[0].page_number, 1);
        assert_eq!(parsed.content_hash.len(), 64);
    }

    #[test]
    fn test_parse_rejects_unsupported_and_empty() {
        assert!(matches!(
            FileParser::parse("photo.jpg", b"data"),
            Err(Error::UnsupportedFileType(_))
        ));
        assert!(matches!(
            FileParser::parse("empty.txt", b"  \n\n "),
            Err(Error::FileParse { .. })
        ));
    }

    /// PDF with one line of Courier text per page
    fn pdf_with_pages(texts: &[&str]) -> Vec<u8> {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Object, Stream};

        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in texts {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => kids.len() as i64,
                "Kids" => kids,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_pdf_pages_are_numbered() {
        let data = pdf_with_pages(&["Verre : bulles a verre", "Carton : sac jaune"]);
        let parsed = FileParser::parse("guide.pdf", &data).unwrap();

        assert_eq!(parsed.file_type, FileType::Pdf);
        assert_eq!(parsed.total_pages, Some(2));
        assert_eq!(parsed.pages.len(), 2);
        assert_eq!(parsed.pages[0].page_number, 1);
        assert!(parsed.pages[0].content.contains("Verre"));
        assert_eq!(parsed.pages[1].page_number, 2);
        assert!(parsed.pages[1].content.contains("Carton"));
    }

    #[test]
    fn test_invalid_pdf_is_parse_error() {
        let err = FileParser::parse("broken.pdf", b"not a pdf").unwrap_err();
        assert!(matches!(err, Error::FileParse { .. }));
    }

    #[test]
    fn test_hash_depends_on_bytes() {
        let a = FileParser::parse("a.txt", b"verre").unwrap();
        let b = FileParser::parse("b.txt", b"verre").unwrap();
        let c = FileParser::parse("c.txt", b"carton").unwrap();
        assert_eq!(a.content_hash, b.content_hash);
        assert_ne!(a.content_hash, c.content_hash);
    }
}
