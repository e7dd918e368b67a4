// src/pdf_text.rs

use lopdf::Document;
use tracing::info;

/// Minimum number of non-whitespace characters a real text invoice yields.
/// Below this the PDF is almost certainly a scan, which we cannot process.
const MIN_TEXT_CHARS: usize = 30;

/// Extract the combined raw text of all pages of an invoice PDF.
///
/// Structural parse failures, extraction failures, and image-only scans are
/// all errors here; the caller decides whether that aborts one file or more.
pub fn extract_invoice_text(pdf_bytes: &[u8]) -> Result<String, Box<dyn std::error::Error>> {
    let doc = Document::load_mem(pdf_bytes).map_err(|e| format!("not a readable PDF: {e}"))?;
    let pages = doc.get_pages().len();

    let text = pdf_extract::extract_text_from_mem(pdf_bytes)
        .map_err(|e| format!("text extraction failed (scanned or corrupted PDF?): {e}"))?;

    let meaningful = text.chars().filter(|c| !c.is_whitespace()).count();
    if meaningful < MIN_TEXT_CHARS {
        return Err(format!(
            "PDF appears to be scanned / image-only \
             ({meaningful} meaningful chars across {pages} pages)"
        )
        .into());
    }

    info!(pages, chars = text.len(), "Text extracted from PDF");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_rejected() {
        let err = extract_invoice_text(b"this is not a pdf").unwrap_err();
        assert!(err.to_string().contains("not a readable PDF"), "{err}");
    }
}
