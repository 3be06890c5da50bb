//! Lossless size reduction
//!
//! - low: Flate-compress every unfiltered stream
//! - medium: also drop unreachable objects and empty streams
//! - high: also strip document metadata and renumber objects densely

use crate::document::{load, save};
use crate::error::PdfOpsError;
use lopdf::{Document, Object};
use pdfsuite_core::options::CompressionLevel;

fn strip_metadata(doc: &mut Document) {
    doc.trailer.remove(b"Info");
    let catalog_id = match doc.trailer.get(b"Root").and_then(Object::as_reference) {
        Ok(id) => id,
        Err(_) => return,
    };
    if let Ok(Object::Dictionary(catalog)) = doc.get_object_mut(catalog_id) {
        catalog.remove(b"Metadata");
    }
}

pub fn compress_document(bytes: &[u8], level: CompressionLevel) -> Result<Vec<u8>, PdfOpsError> {
    let mut doc = load(bytes)?;

    if level == CompressionLevel::High {
        strip_metadata(&mut doc);
    }
    if matches!(level, CompressionLevel::Medium | CompressionLevel::High) {
        doc.prune_objects();
        doc.delete_zero_length_streams();
    }
    if level == CompressionLevel::High {
        doc.renumber_objects();
    }

    doc.compress();
    save(&mut doc)
}
