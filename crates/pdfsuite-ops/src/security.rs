//! Password protection and removal
//!
//! Protection uses the standard security handler with 128-bit RC4 and the
//! same string as user and owner password.

use crate::document::{load, save};
use crate::error::PdfOpsError;
use lopdf::encryption::{EncryptionState, EncryptionVersion, Permissions};
use lopdf::{Document, Object, StringFormat};
use pdfsuite_core::options::ProtectOptions;

const KEY_LENGTH_BITS: usize = 128;

fn is_protected(doc: &Document) -> bool {
    doc.trailer.has(b"Encrypt")
}

fn permissions(options: &ProtectOptions) -> Permissions {
    let mut permissions = Permissions::all();
    if options.prevent_copying {
        permissions.remove(Permissions::COPYABLE);
    }
    if options.prevent_printing {
        permissions.remove(Permissions::PRINTABLE | Permissions::PRINTABLE_IN_HIGH_QUALITY);
    }
    permissions
}

/// The key derivation reads the first file identifier
fn ensure_document_id(doc: &mut Document) {
    if doc.trailer.has(b"ID") {
        return;
    }
    let id = uuid::Uuid::new_v4().as_bytes().to_vec();
    doc.trailer.set(
        "ID",
        vec![
            Object::String(id.clone(), StringFormat::Hexadecimal),
            Object::String(id, StringFormat::Hexadecimal),
        ],
    );
}

/// Encrypt a document so it opens only with the options' password
pub fn protect_document(bytes: &[u8], options: &ProtectOptions) -> Result<Vec<u8>, PdfOpsError> {
    let mut doc = load(bytes)?;
    if is_protected(&doc) {
        return Err(PdfOpsError::OperationError(
            "Document is already password protected".into(),
        ));
    }
    ensure_document_id(&mut doc);

    let state = EncryptionState::try_from(EncryptionVersion::V2 {
        document: &doc,
        owner_password: &options.password,
        user_password: &options.password,
        key_length: KEY_LENGTH_BITS,
        permissions: permissions(options),
    })
    .map_err(|e| PdfOpsError::OperationError(format!("Failed to set up encryption: {}", e)))?;
    doc.encrypt(&state)
        .map_err(|e| PdfOpsError::OperationError(format!("Failed to encrypt: {}", e)))?;

    save(&mut doc)
}

/// Move the decrypted objects into a document without an encryption handler
fn without_encryption(doc: Document) -> Document {
    let mut plain = Document::with_version(doc.version);
    plain.objects = doc.objects;
    plain.max_id = doc.max_id;
    plain.trailer = doc.trailer;
    if let Ok(id) = plain.trailer.get(b"Encrypt").and_then(Object::as_reference) {
        plain.objects.remove(&id);
    }
    plain.trailer.remove(b"Encrypt");
    plain
}

/// Remove password protection; unencrypted documents pass through re-saved
pub fn unlock_document(bytes: &[u8], password: &str) -> Result<Vec<u8>, PdfOpsError> {
    let mut doc = load(bytes)?;
    if !is_protected(&doc) {
        return save(&mut doc);
    }
    doc.decrypt(password).map_err(|_| PdfOpsError::IncorrectPassword)?;

    let mut plain = without_encryption(doc);
    save(&mut plain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::test_support::{create_test_pdf, page_texts};
    use pretty_assertions::assert_eq;

    fn protect_options(password: &str) -> ProtectOptions {
        ProtectOptions {
            password: password.into(),
            confirm_password: password.into(),
            prevent_copying: false,
            prevent_printing: false,
        }
    }

    fn encrypt_dictionary_p(bytes: &[u8]) -> i64 {
        let doc = Document::load_mem(bytes).unwrap();
        let id = doc
            .trailer
            .get(b"Encrypt")
            .and_then(Object::as_reference)
            .unwrap();
        doc.get_object(id)
            .and_then(Object::as_dict)
            .and_then(|dict| dict.get(b"P"))
            .and_then(Object::as_i64)
            .unwrap()
    }

    #[test]
    fn test_protect_then_unlock_restores_content() {
        let pdf = create_test_pdf(2, "Sec");
        let protected = protect_document(&pdf, &protect_options("hunter22")).unwrap();

        let doc = Document::load_mem(&protected).unwrap();
        assert!(is_protected(&doc));
        assert!(doc.trailer.has(b"ID"));

        let unlocked = unlock_document(&protected, "hunter22").unwrap();
        let doc = Document::load_mem(&unlocked).unwrap();
        assert!(!is_protected(&doc));
        assert_eq!(page_texts(&unlocked), vec!["Sec-Page-1", "Sec-Page-2"]);
    }

    #[test]
    fn test_unlock_with_wrong_password() {
        let pdf = create_test_pdf(1, "Sec");
        let protected = protect_document(&pdf, &protect_options("hunter22")).unwrap();

        let err = unlock_document(&protected, "letmein").unwrap_err();
        assert!(matches!(err, PdfOpsError::IncorrectPassword));
        assert_eq!(err.to_string(), "Incorrect password");
    }

    #[test]
    fn test_unlock_plain_document_passes_through() {
        let pdf = create_test_pdf(3, "Open");
        let unlocked = unlock_document(&pdf, "anything").unwrap();
        assert_eq!(
            page_texts(&unlocked),
            vec!["Open-Page-1", "Open-Page-2", "Open-Page-3"]
        );
    }

    #[test]
    fn test_protect_twice_is_rejected() {
        let pdf = create_test_pdf(1, "Sec");
        let protected = protect_document(&pdf, &protect_options("hunter22")).unwrap();
        assert!(matches!(
            protect_document(&protected, &protect_options("other")),
            Err(PdfOpsError::OperationError(_))
        ));
    }

    #[test]
    fn test_restrictions_clear_permission_bits() {
        let pdf = create_test_pdf(1, "Sec");
        let open = protect_document(&pdf, &protect_options("pw")).unwrap();
        let p = encrypt_dictionary_p(&open);
        assert_ne!(p & Permissions::PRINTABLE.bits() as i64, 0);
        assert_ne!(p & Permissions::COPYABLE.bits() as i64, 0);

        let mut options = protect_options("pw");
        options.prevent_copying = true;
        options.prevent_printing = true;
        let locked = protect_document(&pdf, &options).unwrap();
        let p = encrypt_dictionary_p(&locked);
        assert_eq!(p & Permissions::PRINTABLE.bits() as i64, 0);
        assert_eq!(p & Permissions::COPYABLE.bits() as i64, 0);
        assert_ne!(p & Permissions::MODIFIABLE.bits() as i64, 0);
    }
}
