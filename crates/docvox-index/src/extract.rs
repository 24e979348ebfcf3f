//! Page-level text extraction from source documents.
//!
//! PDFs are read with `pdf-extract`, one [`DocumentPage`] per page. Plain
//! text and Markdown files are accepted as a single page with no page number.

use std::path::Path;

use tracing::debug;

use crate::error::IndexError;

/// Text of one page of a source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPage {
    /// Path of the document, as given by the caller.
    pub source: String,
    /// Zero-based page number; `None` for formats without pages.
    pub page: Option<u32>,
    pub text: String,
}

/// Extract the pages of a document, dispatching on its file extension.
///
/// Pages whose text is blank are skipped.
pub fn extract_pages(path: &Path) -> Result<Vec<DocumentPage>, IndexError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let source = path.to_string_lossy().to_string();
    let pages = match extension.as_str() {
        "pdf" => extract_pdf(path, &source)?,
        "txt" | "md" => {
            let text = std::fs::read_to_string(path)?;
            vec![DocumentPage {
                source,
                page: None,
                text,
            }]
        }
        _ => return Err(IndexError::UnsupportedDocument(path.to_path_buf())),
    };

    let pages: Vec<DocumentPage> = pages
        .into_iter()
        .filter(|p| !p.text.trim().is_empty())
        .collect();

    debug!(path = %path.display(), pages = pages.len(), "Document extracted");
    Ok(pages)
}

fn extract_pdf(path: &Path, source: &str) -> Result<Vec<DocumentPage>, IndexError> {
    if !path.exists() {
        return Err(IndexError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        )));
    }

    let pages = pdf_extract::extract_text_by_pages(path).map_err(|e| IndexError::Extraction {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| DocumentPage {
            source: source.to_string(),
            page: Some(i as u32),
            text,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "Refunds are accepted within 30 days.").unwrap();

        let pages = extract_pages(&path).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page, None);
        assert_eq!(pages[0].text, "Refunds are accepted within 30 days.");
        assert!(pages[0].source.ends_with("notes.txt"));
    }

    #[test]
    fn test_blank_text_file_yields_no_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.md");
        std::fs::write(&path, "  \n\n ").unwrap();

        assert!(extract_pages(&path).unwrap().is_empty());
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slides.pptx");
        std::fs::write(&path, "binary").unwrap();

        let err = extract_pages(&path).unwrap_err();
        assert!(matches!(err, IndexError::UnsupportedDocument(_)));
    }

    #[test]
    fn test_missing_pdf() {
        let err = extract_pages(Path::new("/nonexistent/manual.pdf")).unwrap_err();
        assert!(matches!(err, IndexError::Io(_)));
    }

    #[test]
    fn test_invalid_pdf_is_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.PDF");
        std::fs::write(&path, "this is not a pdf").unwrap();

        let err = extract_pages(&path).unwrap_err();
        assert!(matches!(err, IndexError::Extraction { .. }));
    }
}
