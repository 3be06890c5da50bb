//! PDF Split algorithm
//!
//! Extracts pages from a PDF by deleting everything else.

use crate::document::{check_pages, load, save};
use crate::error::PdfOpsError;
use pdfsuite_core::options::PageRange;
use std::collections::HashSet;

/// Split a PDF, extracting only the specified pages (1-indexed)
///
/// Pages keep their document order; duplicates are ignored.
/// 1. Validate the requested pages
/// 2. Delete every other page, last first
/// 3. Prune objects only the deleted pages used
pub fn split_document(bytes: &[u8], pages: &[u32]) -> Result<Vec<u8>, PdfOpsError> {
    if pages.is_empty() {
        return Err(PdfOpsError::InvalidRange("No pages specified".into()));
    }

    let mut doc = load(bytes)?;
    let page_count = doc.get_pages().len() as u32;
    check_pages(pages, page_count)?;

    let pages_to_keep: HashSet<u32> = pages.iter().copied().collect();
    let pages_to_delete: Vec<u32> = (1..=page_count)
        .rev()
        .filter(|p| !pages_to_keep.contains(p))
        .collect();

    for page_num in pages_to_delete {
        doc.delete_pages(&[page_num]);
    }

    doc.prune_objects();
    doc.compress();
    save(&mut doc)
}

/// One output document per inclusive range
pub fn split_ranges(bytes: &[u8], ranges: &[PageRange]) -> Result<Vec<Vec<u8>>, PdfOpsError> {
    if ranges.is_empty() {
        return Err(PdfOpsError::InvalidRange("No ranges specified".into()));
    }
    ranges
        .iter()
        .map(|&PageRange { start, end }| {
            if start > end {
                return Err(PdfOpsError::InvalidRange(format!(
                    "Start {} > end {}",
                    start, end
                )));
            }
            let pages: Vec<u32> = (start..=end).collect();
            split_document(bytes, &pages)
        })
        .collect()
}
