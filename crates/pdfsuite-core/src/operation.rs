//! The closed set of operations the suite knows how to run

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the nine supported PDF transformations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Merge,
    Split,
    Compress,
    ConvertTo,
    ConvertFrom,
    Rotate,
    Watermark,
    Protect,
    Unlock,
}

impl OperationKind {
    pub const ALL: [OperationKind; 9] = [
        OperationKind::Merge,
        OperationKind::Split,
        OperationKind::Compress,
        OperationKind::ConvertTo,
        OperationKind::ConvertFrom,
        OperationKind::Rotate,
        OperationKind::Watermark,
        OperationKind::Protect,
        OperationKind::Unlock,
    ];

    /// Wire name, also used as the default upload folder
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Merge => "merge",
            OperationKind::Split => "split",
            OperationKind::Compress => "compress",
            OperationKind::ConvertTo => "convert-to",
            OperationKind::ConvertFrom => "convert-from",
            OperationKind::Rotate => "rotate",
            OperationKind::Watermark => "watermark",
            OperationKind::Protect => "protect",
            OperationKind::Unlock => "unlock",
        }
    }

    /// Past tense used in user-facing completion messages
    pub fn past_tense(&self) -> &'static str {
        match self {
            OperationKind::Merge => "merged",
            OperationKind::Split => "split",
            OperationKind::Compress => "compressed",
            OperationKind::ConvertTo | OperationKind::ConvertFrom => "converted",
            OperationKind::Rotate => "rotated",
            OperationKind::Watermark => "watermarked",
            OperationKind::Protect => "protected",
            OperationKind::Unlock => "unlocked",
        }
    }

    /// Whether the operation consumes PDFs (everything except `convert-to`)
    pub fn takes_pdf_input(&self) -> bool {
        !matches!(self, OperationKind::ConvertTo)
    }

    /// Inclusive bounds on the number of inputs; `None` means unbounded
    pub fn input_bounds(&self) -> (usize, Option<usize>) {
        match self {
            OperationKind::Merge => (2, None),
            OperationKind::ConvertTo => (1, None),
            _ => (1, Some(1)),
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown operation name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown operation: {0}")]
pub struct UnknownOperation(pub String);

impl FromStr for OperationKind {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownOperation(s.to_string()))
    }
}
