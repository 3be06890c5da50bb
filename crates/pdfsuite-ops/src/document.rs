//! Loading, saving and page-tree helpers shared by the operations

use crate::error::PdfOpsError;
use lopdf::{Document, Object, ObjectId};

/// Page attributes a page may inherit from its ancestors
pub(crate) const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guards against cyclic Parent chains in damaged files
const MAX_TREE_DEPTH: usize = 64;

/// US Letter, used when a page has no usable MediaBox
const FALLBACK_PAGE_SIZE: PageBox = PageBox {
    x: 0.0,
    y: 0.0,
    width: 612.0,
    height: 792.0,
};

pub(crate) fn load(bytes: &[u8]) -> Result<Document, PdfOpsError> {
    Document::load_mem(bytes).map_err(|e| PdfOpsError::ParseError(e.to_string()))
}

pub(crate) fn save(doc: &mut Document) -> Result<Vec<u8>, PdfOpsError> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfOpsError::OperationError(format!("Save failed: {}", e)))?;
    Ok(buffer)
}

/// Object id of the root Pages node
pub(crate) fn pages_root(doc: &Document) -> Result<ObjectId, PdfOpsError> {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| PdfOpsError::OperationError("No Root in trailer".into()))?;
    doc.get_object(catalog_id)
        .and_then(Object::as_dict)
        .map_err(|_| PdfOpsError::OperationError("Invalid catalog".into()))?
        .get(b"Pages")
        .and_then(Object::as_reference)
        .map_err(|_| PdfOpsError::OperationError("No Pages in catalog".into()))
}

/// Walk the Parent chain looking for `key`
pub(crate) fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = Some(page_id);
    let mut depth = 0;
    while let Some(id) = current {
        let dict = doc.get_object(id).and_then(Object::as_dict).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
        if depth > MAX_TREE_DEPTH {
            break;
        }
    }
    None
}

/// Follow a reference to the object it names
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        other => other,
    }
}

pub(crate) fn as_number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f),
        _ => None,
    }
}

/// Visible area of a page in default user space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

pub(crate) fn page_box(doc: &Document, page_id: ObjectId) -> PageBox {
    let media_box = inherited_attribute(doc, page_id, b"MediaBox");
    let parsed = media_box.as_ref().and_then(|raw| {
        let values = resolve(doc, raw).as_array().ok()?;
        if values.len() != 4 {
            return None;
        }
        let numbers: Vec<f32> = values
            .iter()
            .filter_map(|v| as_number(resolve(doc, v)))
            .collect();
        if numbers.len() != 4 {
            return None;
        }
        let (llx, lly) = (numbers[0].min(numbers[2]), numbers[1].min(numbers[3]));
        let (urx, ury) = (numbers[0].max(numbers[2]), numbers[1].max(numbers[3]));
        Some(PageBox {
            x: llx,
            y: lly,
            width: urx - llx,
            height: ury - lly,
        })
    });
    match parsed {
        Some(found) if found.width > 0.0 && found.height > 0.0 => found,
        _ => FALLBACK_PAGE_SIZE,
    }
}

/// Copy inherited attributes onto every page so pages can be re-parented
pub(crate) fn flatten_inherited_attributes(doc: &mut Document) {
    let page_ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();
    for page_id in page_ids {
        let missing: Vec<(&[u8], Object)> = INHERITABLE_KEYS
            .iter()
            .filter_map(|key| {
                let own = doc
                    .get_object(page_id)
                    .and_then(Object::as_dict)
                    .map(|d| d.has(key))
                    .unwrap_or(true);
                if own {
                    None
                } else {
                    inherited_attribute(doc, page_id, key).map(|value| (*key, value))
                }
            })
            .collect();
        if let Ok(Object::Dictionary(page)) = doc.get_object_mut(page_id) {
            for (key, value) in missing {
                page.set(key.to_vec(), value);
            }
        }
    }
}

/// Validate 1-indexed page numbers against the document
pub(crate) fn check_pages(pages: &[u32], page_count: u32) -> Result<(), PdfOpsError> {
    if pages.contains(&0) {
        return Err(PdfOpsError::InvalidRange("Page numbers must be >= 1".into()));
    }
    for &page in pages {
        if page > page_count {
            return Err(PdfOpsError::InvalidRange(format!(
                "Page {} does not exist (document has {} pages)",
                page, page_count
            )));
        }
    }
    Ok(())
}

/// Fixture documents for tests in this crate and its dependents
#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use lopdf::{content::Content, content::Operation, dictionary, Dictionary, Document, Object, Stream};

    /// A PDF with `num_pages` pages whose text reads `<prefix>-Page-<n>`
    pub fn create_test_pdf(num_pages: u32, prefix: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });

        let mut page_ids = Vec::new();
        for i in 0..num_pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
                    Operation::new("Td", vec![Object::Integer(100), Object::Integer(700)]),
                    Operation::new(
                        "Tj",
                        vec![Object::String(
                            format!("{}-Page-{}", prefix, i + 1).into_bytes(),
                            lopdf::StringFormat::Literal,
                        )],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            page_ids.push(page_id);
        }

        // MediaBox and Resources live on the Pages node so pages inherit them
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => num_pages as i64,
                "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    /// Text drawn on each page, in page order
    pub fn page_texts(bytes: &[u8]) -> Vec<String> {
        let doc = Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .values()
            .map(|page_id| {
                let content = doc.get_and_decode_page_content(*page_id).unwrap();
                content
                    .operations
                    .iter()
                    .filter(|op| op.operator == "Tj")
                    .filter_map(|op| match op.operands.first() {
                        Some(Object::String(bytes, _)) => {
                            Some(String::from_utf8_lossy(bytes).into_owned())
                        }
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect()
    }
}
