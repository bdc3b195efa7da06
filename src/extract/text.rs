//! PDF text extraction
//!
//! Extraction is all-or-nothing: if any page fails to decode, the whole
//! document fails with an `ExtractionError` instead of returning partial text.

use crate::extract::ExtractionError;
use lopdf::Document;
use std::path::Path;

/// Full text of a PDF and the number of pages it was read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub page_count: u32,
}

impl ExtractedText {
    /// Length of the text in characters
    pub fn text_length(&self) -> usize {
        self.text.chars().count()
    }

    /// First `max_chars` characters of the text
    pub fn summary(&self, max_chars: usize) -> String {
        self.text.chars().take(max_chars).collect()
    }
}

/// Extracts the text of every page, in page order, each followed by a newline
///
/// # Arguments
///
/// * `path` - Path to a PDF file
///
/// # Returns
///
/// * `Ok(ExtractedText)` - Concatenated page text and page count
/// * `Err(ExtractionError)` - The file is not a PDF or a page could not be decoded
pub fn extract_text(path: &Path) -> Result<ExtractedText, ExtractionError> {
    let document = Document::load(path).map_err(|e| ExtractionError::InvalidPdf {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let pages = document.get_pages();
    let mut text = String::new();

    // get_pages is keyed by page number, so iteration is in page order
    for page_number in pages.keys() {
        let page_text =
            document
                .extract_text(&[*page_number])
                .map_err(|e| ExtractionError::PageDecode {
                    path: path.display().to_string(),
                    page: *page_number,
                    message: e.to_string(),
                })?;
        text.push_str(&page_text);
        text.push('\n');
    }

    Ok(ExtractedText {
        text,
        page_count: pages.len() as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::test_support::write_pdf;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_extracts_pages_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("two_pages.pdf");
        write_pdf(&path, &["Alpha harvesting pipeline", "Omega storage ledger"]);

        let extracted = extract_text(&path).unwrap();

        assert_eq!(extracted.page_count, 2);
        let alpha = extracted.text.find("Alpha").unwrap();
        let omega = extracted.text.find("Omega").unwrap();
        assert!(alpha < omega);
        assert!(extracted.text.ends_with('\n'));
    }

    #[test]
    fn test_non_pdf_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"<html>definitely not a pdf</html>").unwrap();
        file.flush().unwrap();

        let result = extract_text(file.path());
        assert!(matches!(result, Err(ExtractionError::InvalidPdf { .. })));
    }

    #[test]
    fn test_missing_file_is_rejected() {
        let result = extract_text(Path::new("/nonexistent/doc.pdf"));
        assert!(result.is_err());
    }

    #[test]
    fn test_summary_counts_characters() {
        let extracted = ExtractedText {
            text: "ééééé-rest".to_string(),
            page_count: 1,
        };
        assert_eq!(extracted.summary(5), "ééééé");
        assert_eq!(extracted.text_length(), 10);
        assert_eq!(extracted.summary(500), "ééééé-rest");
    }
}
