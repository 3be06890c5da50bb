//! Page rotation
//!
//! The requested quarter turns are added to whatever rotation a page already
//! has, including one inherited from its Pages ancestors.

use crate::document::{check_pages, inherited_attribute, load, save};
use crate::error::PdfOpsError;
use lopdf::Object;
use pdfsuite_core::options::Rotation;
use std::collections::BTreeMap;

/// Effective rotation of a page in degrees, normalized to 0..360
fn current_rotation(doc: &lopdf::Document, page_id: lopdf::ObjectId) -> i64 {
    inherited_attribute(doc, page_id, b"Rotate")
        .and_then(|value| value.as_i64().ok())
        .unwrap_or(0)
        .rem_euclid(360)
}

/// Rotate the listed pages (1-indexed) clockwise. Unlisted pages are untouched.
pub fn rotate_pages(
    bytes: &[u8],
    degrees_by_page: &BTreeMap<u32, Rotation>,
) -> Result<Vec<u8>, PdfOpsError> {
    let mut doc = load(bytes)?;
    let pages = doc.get_pages();
    let requested: Vec<u32> = degrees_by_page.keys().copied().collect();
    check_pages(&requested, pages.len() as u32)?;

    for (page_num, rotation) in degrees_by_page {
        if *rotation == Rotation::None {
            continue;
        }
        let Some(&page_id) = pages.get(page_num) else {
            continue;
        };
        let updated = (current_rotation(&doc, page_id) + i64::from(rotation.degrees())) % 360;
        match doc.get_object_mut(page_id) {
            Ok(Object::Dictionary(page)) => page.set("Rotate", Object::Integer(updated)),
            _ => {
                return Err(PdfOpsError::OperationError(format!(
                    "Page {} is not a dictionary",
                    page_num
                )))
            }
        }
    }

    save(&mut doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::test_support::create_test_pdf;
    use lopdf::Document;

    fn rotations(bytes: &[u8]) -> Vec<i64> {
        let doc = Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .values()
            .map(|id| current_rotation(&doc, *id))
            .collect()
    }

    #[test]
    fn test_rotates_only_listed_pages() {
        let pdf = create_test_pdf(3, "R");
        let result = rotate_pages(
            &pdf,
            &BTreeMap::from([(1, Rotation::Clockwise90), (3, Rotation::Half)]),
        )
        .unwrap();
        assert_eq!(rotations(&result), vec![90, 0, 180]);
    }

    #[test]
    fn test_rotation_adds_to_existing_rotation() {
        let pdf = create_test_pdf(1, "R");
        let once = rotate_pages(&pdf, &BTreeMap::from([(1, Rotation::Clockwise270)])).unwrap();
        let twice = rotate_pages(&once, &BTreeMap::from([(1, Rotation::Half)])).unwrap();
        assert_eq!(rotations(&twice), vec![90]);
    }

    #[test]
    fn test_inherited_rotation_is_respected() {
        let mut doc = Document::load_mem(&create_test_pdf(2, "R")).unwrap();
        let pages_id = crate::document::pages_root(&doc).unwrap();
        if let Ok(Object::Dictionary(pages)) = doc.get_object_mut(pages_id) {
            pages.set("Rotate", Object::Integer(-90));
        }
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();

        let result = rotate_pages(&buffer, &BTreeMap::from([(2, Rotation::Clockwise90)])).unwrap();
        assert_eq!(rotations(&result), vec![270, 0]);
    }

    #[test]
    fn test_out_of_range_page_fails() {
        let pdf = create_test_pdf(2, "R");
        let err = rotate_pages(&pdf, &BTreeMap::from([(7, Rotation::Clockwise90)])).unwrap_err();
        assert!(matches!(err, PdfOpsError::InvalidRange(_)));
    }
}
