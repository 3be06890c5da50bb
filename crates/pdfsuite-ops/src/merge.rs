//! PDF Merge algorithm
//!
//! Combines multiple PDFs into a single document, in input order.

use crate::document::{flatten_inherited_attributes, pages_root, save, INHERITABLE_KEYS};
use crate::error::PdfOpsError;
use lopdf::{Document, Object, ObjectId};

/// Merge multiple PDFs into one
///
/// The algorithm:
/// 1. Load every document and copy inherited page attributes onto the pages
/// 2. Use the first document as the destination
/// 3. For each further document:
///    a. Offset its object ids past the destination's highest id
///    b. Import all objects with remapped references
///    c. Append its pages to the destination page list
/// 4. Point the root Pages node at the combined list and re-parent every page
/// 5. Drop the now unreachable source catalogs, compress and save
pub fn merge_documents(documents: &[Vec<u8>]) -> Result<Vec<u8>, PdfOpsError> {
    let (first, rest) = documents
        .split_first()
        .ok_or_else(|| PdfOpsError::OperationError("No documents to merge".into()))?;

    let mut dest = Document::load_mem(first)
        .map_err(|e| PdfOpsError::ParseError(format!("Failed to load document 1: {}", e)))?;
    flatten_inherited_attributes(&mut dest);
    let mut dest_page_refs = page_references(&dest);

    for (i, bytes) in rest.iter().enumerate() {
        let mut source = Document::load_mem(bytes).map_err(|e| {
            PdfOpsError::ParseError(format!("Failed to load document {}: {}", i + 2, e))
        })?;
        flatten_inherited_attributes(&mut source);
        let source_pages = page_references(&source);

        let id_offset = dest.max_id;
        for (old_id, object) in source.objects.into_iter() {
            let new_id = (old_id.0 + id_offset, old_id.1);
            dest.objects.insert(new_id, remap_object_refs(object, id_offset));
        }
        dest_page_refs.extend(
            source_pages
                .into_iter()
                .map(|(number, generation)| (number + id_offset, generation)),
        );
        dest.max_id = (source.max_id + id_offset).max(dest.max_id);
    }

    update_page_tree(&mut dest, &dest_page_refs)?;

    dest.prune_objects();
    dest.compress();
    save(&mut dest)
}

fn page_references(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().values().copied().collect()
}

/// Recursively remap object references in an object
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(std::mem::replace(value, Object::Null), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(std::mem::replace(value, Object::Null), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

/// Replace the root page list and make every page a direct child of it
fn update_page_tree(doc: &mut Document, page_refs: &[ObjectId]) -> Result<(), PdfOpsError> {
    let pages_id = pages_root(doc)?;

    match doc.objects.get_mut(&pages_id) {
        Some(Object::Dictionary(pages_dict)) => {
            let kids = page_refs
                .iter()
                .map(|&id| Object::Reference(id))
                .collect::<Vec<_>>();
            pages_dict.set("Kids", Object::Array(kids));
            pages_dict.set("Count", Object::Integer(page_refs.len() as i64));
            // Inherited values now live on the pages themselves
            for key in INHERITABLE_KEYS {
                pages_dict.remove(key);
            }
        }
        _ => {
            return Err(PdfOpsError::OperationError(
                "Invalid pages dictionary".into(),
            ))
        }
    }

    for page_id in page_refs {
        if let Some(Object::Dictionary(page)) = doc.objects.get_mut(page_id) {
            page.set("Parent", Object::Reference(pages_id));
        }
    }

    Ok(())
}
