//! PDF merge, split, rotate, compress, watermark and password operations
//!
//! Everything works on in-memory PDF bytes using lopdf. `process` picks the
//! operation from a set of parsed `OperationOptions`.

pub mod command;
mod document;
pub mod compress;
pub mod error;
pub mod merge;
pub mod rotate;
pub mod security;
pub mod split;
pub mod watermark;

pub use command::{process, ProcessMetrics, ProcessResult};
pub use compress::compress_document;
pub use document::PageBox;
pub use error::PdfOpsError;
pub use merge::merge_documents;
pub use rotate::rotate_pages;
pub use security::{protect_document, unlock_document};
pub use split::{split_document, split_ranges};
pub use watermark::watermark_document;

#[cfg(any(test, feature = "test-support"))]
pub use document::test_support;

/// Whether `process` can run this kind of operation
pub fn is_supported(kind: pdfsuite_core::OperationKind) -> bool {
    use pdfsuite_core::OperationKind::*;
    matches!(
        kind,
        Merge | Split | Compress | Rotate | Watermark | Protect | Unlock
    )
}

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, PdfOpsError> {
    let doc =
        lopdf::Document::load_mem(bytes).map_err(|e| PdfOpsError::ParseError(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_page_count() {
        let pdf = document::test_support::create_test_pdf(4, "Count");
        assert_eq!(get_page_count(&pdf).unwrap(), 4);
        assert!(get_page_count(b"%PDF-broken").is_err());
    }

    #[test]
    fn test_supported_operations() {
        use pdfsuite_core::OperationKind;
        let supported: Vec<OperationKind> = OperationKind::ALL
            .iter()
            .copied()
            .filter(|kind| is_supported(*kind))
            .collect();
        assert_eq!(
            supported,
            vec![
                OperationKind::Merge,
                OperationKind::Split,
                OperationKind::Compress,
                OperationKind::Rotate,
                OperationKind::Watermark,
                OperationKind::Protect,
                OperationKind::Unlock
            ]
        );
    }
}
