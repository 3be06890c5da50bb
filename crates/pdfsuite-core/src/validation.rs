//! Input validation
//!
//! Pure checks run in the Validating phase. Nothing here touches the network.

use std::sync::Arc;

use crate::error::ValidationError;
use crate::file::PendingFile;
use crate::operation::OperationKind;
use crate::options::OperationOptions;

pub const PDF_MEDIA_TYPE: &str = "application/pdf";
pub const DOCX_MEDIA_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const PPTX_MEDIA_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// Types `convert-to` turns into a PDF
pub const CONVERTIBLE_MEDIA_TYPES: [&str; 4] =
    ["image/jpeg", "image/png", DOCX_MEDIA_TYPE, PPTX_MEDIA_TYPE];

const MIB: u64 = 1024 * 1024;

pub const MAX_DOCUMENT_BYTES: u64 = 10 * MIB;
pub const MAX_WATERMARK_IMAGE_BYTES: u64 = 2 * MIB;

/// Byte ceilings; a file is too large only when strictly above its ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimits {
    pub max_document_bytes: u64,
    pub max_image_bytes: u64,
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            max_document_bytes: MAX_DOCUMENT_BYTES,
            max_image_bytes: MAX_WATERMARK_IMAGE_BYTES,
        }
    }
}

/// Whether `kind` accepts inputs of `media_type`
pub fn accepts_media_type(kind: OperationKind, media_type: &str) -> bool {
    let media_type = media_type.trim().to_ascii_lowercase();
    if kind.takes_pdf_input() {
        media_type == PDF_MEDIA_TYPE
    } else {
        CONVERTIBLE_MEDIA_TYPES.contains(&media_type.as_str())
    }
}

pub fn check_cardinality(kind: OperationKind, count: usize) -> Result<(), ValidationError> {
    if count == 0 {
        return Err(ValidationError::NoInputs);
    }
    let (min, max) = kind.input_bounds();
    if count < min {
        return Err(ValidationError::TooFewInputs {
            kind,
            min,
            actual: count,
        });
    }
    if let Some(max) = max {
        if count > max {
            return Err(ValidationError::TooManyInputs {
                kind,
                max,
                actual: count,
            });
        }
    }
    Ok(())
}

fn check_size(file: &PendingFile, limit: u64) -> Result<(), ValidationError> {
    if file.len() > limit {
        return Err(ValidationError::FileTooLarge {
            file: file.name().to_string(),
            size: file.len(),
            limit_mib: limit / MIB,
        });
    }
    Ok(())
}

/// Type first, then size
pub fn check_input(
    kind: OperationKind,
    file: &PendingFile,
    limits: &SizeLimits,
) -> Result<(), ValidationError> {
    if !accepts_media_type(kind, file.media_type()) {
        return Err(ValidationError::UnsupportedType {
            file: file.name().to_string(),
            media_type: file.media_type().to_string(),
        });
    }
    check_size(file, limits.max_document_bytes)
}

pub fn check_watermark_image(
    file: &PendingFile,
    limits: &SizeLimits,
) -> Result<(), ValidationError> {
    if !file.media_type().trim().to_ascii_lowercase().starts_with("image/") {
        return Err(ValidationError::UnsupportedType {
            file: file.name().to_string(),
            media_type: file.media_type().to_string(),
        });
    }
    check_size(file, limits.max_image_bytes)
}

/// Full validation for a run. The first failure wins, in this order:
/// cardinality, each input in order, the watermark image, the options.
/// `None` options only pass for kinds that need no settings.
pub fn validate_run(
    kind: OperationKind,
    inputs: &[Arc<PendingFile>],
    options: Option<&OperationOptions>,
    limits: &SizeLimits,
) -> Result<OperationOptions, ValidationError> {
    check_cardinality(kind, inputs.len())?;
    for file in inputs {
        check_input(kind, file, limits)?;
    }
    let options = match options {
        Some(options) => options.clone(),
        None => OperationOptions::default_for(kind).ok_or_else(|| {
            ValidationError::InvalidOptions(format!("{} needs options", kind))
        })?,
    };
    if let Some(image) = options.pending_image() {
        check_watermark_image(image, limits)?;
    }
    if options.kind() != kind {
        return Err(ValidationError::InvalidOptions(format!(
            "options are for {}, run is for {}",
            options.kind(),
            kind
        )));
    }
    options.validate()?;
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{CompressOptions, WatermarkOptions};

    fn file(name: &str, media_type: &str, len: usize) -> Arc<PendingFile> {
        Arc::new(PendingFile::new(name, media_type, vec![0u8; len]).unwrap())
    }

    #[test]
    fn test_cardinality() {
        for kind in OperationKind::ALL {
            assert_eq!(check_cardinality(kind, 0), Err(ValidationError::NoInputs));
        }
        assert!(matches!(
            check_cardinality(OperationKind::Merge, 1),
            Err(ValidationError::TooFewInputs { min: 2, actual: 1, .. })
        ));
        assert!(check_cardinality(OperationKind::Merge, 2).is_ok());
        assert!(check_cardinality(OperationKind::ConvertTo, 5).is_ok());
        assert!(matches!(
            check_cardinality(OperationKind::Compress, 2),
            Err(ValidationError::TooManyInputs { max: 1, actual: 2, .. })
        ));
    }

    #[test]
    fn test_media_types() {
        assert!(accepts_media_type(OperationKind::Rotate, "application/pdf"));
        assert!(accepts_media_type(OperationKind::Rotate, "Application/PDF"));
        assert!(!accepts_media_type(OperationKind::Rotate, "text/plain"));
        assert!(accepts_media_type(OperationKind::ConvertTo, "image/png"));
        assert!(accepts_media_type(OperationKind::ConvertTo, DOCX_MEDIA_TYPE));
        assert!(!accepts_media_type(OperationKind::ConvertTo, "application/pdf"));
        assert!(!accepts_media_type(OperationKind::ConvertTo, "image/gif"));
    }

    #[test]
    fn test_size_limit_is_strict() {
        let limits = SizeLimits::default();
        let at_limit = file("a.pdf", PDF_MEDIA_TYPE, MAX_DOCUMENT_BYTES as usize);
        assert!(check_input(OperationKind::Compress, &at_limit, &limits).is_ok());

        let over = file("b.pdf", PDF_MEDIA_TYPE, MAX_DOCUMENT_BYTES as usize + 1);
        assert!(matches!(
            check_input(OperationKind::Compress, &over, &limits),
            Err(ValidationError::FileTooLarge { limit_mib: 10, .. })
        ));
    }

    #[test]
    fn test_type_is_checked_before_size() {
        let limits = SizeLimits::default();
        let big_text = file("notes.txt", "text/plain", MAX_DOCUMENT_BYTES as usize + 1);
        assert!(matches!(
            check_input(OperationKind::Compress, &big_text, &limits),
            Err(ValidationError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_watermark_image_limits() {
        let limits = SizeLimits::default();
        let logo = file("logo.png", "image/png", 1024);
        assert!(check_watermark_image(&logo, &limits).is_ok());

        let big = file("logo.png", "image/png", MAX_WATERMARK_IMAGE_BYTES as usize + 1);
        assert!(matches!(
            check_watermark_image(&big, &limits),
            Err(ValidationError::FileTooLarge { limit_mib: 2, .. })
        ));

        let pdf = file("logo.pdf", PDF_MEDIA_TYPE, 10);
        assert!(matches!(
            check_watermark_image(&pdf, &limits),
            Err(ValidationError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_first_bad_input_wins() {
        let limits = SizeLimits::default();
        let inputs = vec![
            file("a.pdf", PDF_MEDIA_TYPE, 10),
            file("b.txt", "text/plain", 10),
            file("c.pdf", PDF_MEDIA_TYPE, MAX_DOCUMENT_BYTES as usize + 1),
        ];
        let options = OperationOptions::default_for(OperationKind::Merge).unwrap();
        let err = validate_run(OperationKind::Merge, &inputs, Some(&options), &limits).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnsupportedType {
                file: "b.txt".into(),
                media_type: "text/plain".into()
            }
        );
    }

    #[test]
    fn test_inputs_are_checked_before_watermark_image_and_options() {
        let limits = SizeLimits::default();
        let inputs = vec![file("a.txt", "text/plain", 10)];
        let mut watermark = WatermarkOptions::image(file("big.png", "image/png", 3 * MIB as usize));
        watermark.opacity_percent = 0;
        let options = OperationOptions::Watermark(watermark.clone());

        let err = validate_run(OperationKind::Watermark, &inputs, Some(&options), &limits).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedType { .. }));

        let inputs = vec![file("a.pdf", PDF_MEDIA_TYPE, 10)];
        let err = validate_run(OperationKind::Watermark, &inputs, Some(&options), &limits).unwrap_err();
        assert!(matches!(err, ValidationError::FileTooLarge { .. }));

        watermark.image = Some(file("small.png", "image/png", 10));
        let options = OperationOptions::Watermark(watermark);
        let err = validate_run(OperationKind::Watermark, &inputs, Some(&options), &limits).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidOptions(_)));
    }

    #[test]
    fn test_mismatched_options_are_invalid() {
        let limits = SizeLimits::default();
        let inputs = vec![file("a.pdf", PDF_MEDIA_TYPE, 10)];
        let options = OperationOptions::Compress(CompressOptions::default());
        let err = validate_run(OperationKind::Rotate, &inputs, Some(&options), &limits).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidOptions(_)));
    }

    #[test]
    fn test_missing_options() {
        let limits = SizeLimits::default();
        let inputs = vec![file("a.pdf", PDF_MEDIA_TYPE, 10)];
        let resolved = validate_run(OperationKind::Compress, &inputs, None, &limits).unwrap();
        assert_eq!(resolved, OperationOptions::Compress(CompressOptions::default()));

        let err = validate_run(OperationKind::Unlock, &inputs, None, &limits).unwrap_err();
        assert_eq!(err, ValidationError::InvalidOptions("unlock needs options".into()));
    }
}
