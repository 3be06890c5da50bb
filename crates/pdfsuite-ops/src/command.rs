use crate::compress::compress_document;
use crate::error::PdfOpsError;
use crate::merge::merge_documents;
use crate::rotate::rotate_pages;
use crate::security::{protect_document, unlock_document};
use crate::split::{split_document, split_ranges};
use crate::watermark::watermark_document;
use pdfsuite_core::options::{OperationOptions, SplitOptions};
use serde::Serialize;
use std::time::Instant;

/// Documents produced by one operation, in output order
#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub documents: Vec<Vec<u8>>,
    pub metrics: ProcessMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: u32,
    pub processing_time_ms: u64,
}

fn single_input(inputs: &[Vec<u8>]) -> Result<&[u8], PdfOpsError> {
    match inputs {
        [only] => Ok(only.as_slice()),
        _ => Err(PdfOpsError::OperationError(format!(
            "Expected exactly one document, got {}",
            inputs.len()
        ))),
    }
}

/// Run the operation the options describe against the input documents
///
/// `image` holds the watermark image bytes when the options ask for one.
pub fn process(
    options: &OperationOptions,
    inputs: &[Vec<u8>],
    image: Option<&[u8]>,
) -> Result<ProcessResult, PdfOpsError> {
    let started = Instant::now();

    let documents = match options {
        OperationOptions::Merge(_) => vec![merge_documents(inputs)?],
        OperationOptions::Split(SplitOptions::Extract { pages }) => {
            vec![split_document(single_input(inputs)?, pages)?]
        }
        OperationOptions::Split(SplitOptions::Range { ranges }) => {
            split_ranges(single_input(inputs)?, ranges)?
        }
        OperationOptions::Compress(compress) => vec![compress_document(
            single_input(inputs)?,
            compress.compression_level,
        )?],
        OperationOptions::Rotate(rotate) => {
            vec![rotate_pages(single_input(inputs)?, &rotate.degrees_by_page)?]
        }
        OperationOptions::Watermark(watermark) => vec![watermark_document(
            single_input(inputs)?,
            watermark,
            image,
        )?],
        OperationOptions::Protect(protect) => {
            vec![protect_document(single_input(inputs)?, protect)?]
        }
        OperationOptions::Unlock(unlock) => {
            vec![unlock_document(single_input(inputs)?, &unlock.password)?]
        }
        OperationOptions::ConvertTo(_) | OperationOptions::ConvertFrom(_) => {
            return Err(PdfOpsError::Unsupported(options.kind().to_string()))
        }
    };

    let page_count = documents
        .iter()
        .map(|doc| crate::get_page_count(doc))
        .sum::<Result<u32, _>>()?;
    let metrics = ProcessMetrics {
        input_size_bytes: inputs.iter().map(Vec::len).sum(),
        output_size_bytes: documents.iter().map(Vec::len).sum(),
        page_count,
        processing_time_ms: started.elapsed().as_millis() as u64,
    };

    Ok(ProcessResult { documents, metrics })
}
