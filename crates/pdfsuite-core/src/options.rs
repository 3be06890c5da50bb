//! Per-operation options, one variant per [`OperationKind`]
//!
//! On the wire every variant is a plain camelCase JSON object. Parsing is
//! driven by the operation kind, so the object itself carries no tag.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ValidationError;
use crate::file::PendingFile;
use crate::operation::OperationKind;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OperationOptions {
    Merge(MergeOptions),
    Split(SplitOptions),
    Compress(CompressOptions),
    ConvertTo(ConvertToOptions),
    ConvertFrom(ConvertFromOptions),
    Rotate(RotateOptions),
    Watermark(WatermarkOptions),
    Protect(ProtectOptions),
    Unlock(UnlockOptions),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOptions {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SplitOptions {
    /// One output per range
    Range { ranges: Vec<PageRange> },
    /// A single output holding the listed pages
    Extract { pages: Vec<u32> },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressOptions {
    #[serde(default)]
    pub compression_level: CompressionLevel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Margin {
    None,
    #[default]
    Normal,
    Wide,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertToOptions {
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub margin: Margin,
    #[serde(default = "default_true")]
    pub combine_images: bool,
}

impl Default for ConvertToOptions {
    fn default() -> Self {
        Self {
            orientation: Orientation::default(),
            margin: Margin::default(),
            combine_images: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvertFormat {
    Docx,
    Jpg,
    Pptx,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertFromOptions {
    pub format: ConvertFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<u32>>,
}

/// Quarter-turn clockwise rotation, serialized as degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    None,
    Clockwise90,
    Half,
    Clockwise270,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Clockwise90 => 90,
            Rotation::Half => 180,
            Rotation::Clockwise270 => 270,
        }
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> u16 {
        rotation.degrees()
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::None),
            90 => Ok(Rotation::Clockwise90),
            180 => Ok(Rotation::Half),
            270 => Ok(Rotation::Clockwise270),
            other => Err(format!("rotation must be 0, 90, 180 or 270 degrees, got {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotateOptions {
    pub degrees_by_page: BTreeMap<u32, Rotation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkKind {
    Text,
    Image,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPosition {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    #[default]
    Center,
    CenterRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl WatermarkPosition {
    pub const ALL: [WatermarkPosition; 9] = [
        WatermarkPosition::TopLeft,
        WatermarkPosition::TopCenter,
        WatermarkPosition::TopRight,
        WatermarkPosition::CenterLeft,
        WatermarkPosition::Center,
        WatermarkPosition::CenterRight,
        WatermarkPosition::BottomLeft,
        WatermarkPosition::BottomCenter,
        WatermarkPosition::BottomRight,
    ];
}

pub const DEFAULT_WATERMARK_COLOR: &str = "#FF0000";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatermarkOptions {
    pub kind: WatermarkKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default = "default_color")]
    pub color: String,
    /// Storage path of an already uploaded image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    #[serde(default = "default_opacity")]
    pub opacity_percent: u8,
    #[serde(default = "default_size")]
    pub size_percent: u8,
    #[serde(default = "default_watermark_rotation")]
    pub rotation_degrees: u16,
    #[serde(default)]
    pub position: WatermarkPosition,
    /// Image to upload with the inputs; its storage path becomes `imageRef`
    #[serde(skip)]
    pub image: Option<Arc<PendingFile>>,
}

fn default_color() -> String {
    DEFAULT_WATERMARK_COLOR.to_string()
}

fn default_opacity() -> u8 {
    30
}

fn default_size() -> u8 {
    50
}

fn default_watermark_rotation() -> u16 {
    45
}

impl WatermarkOptions {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: WatermarkKind::Text,
            text: Some(text.into()),
            ..Self::blank(WatermarkKind::Text)
        }
    }

    pub fn image(image: Arc<PendingFile>) -> Self {
        Self {
            image: Some(image),
            ..Self::blank(WatermarkKind::Image)
        }
    }

    fn blank(kind: WatermarkKind) -> Self {
        Self {
            kind,
            text: None,
            color: default_color(),
            image_ref: None,
            opacity_percent: default_opacity(),
            size_percent: default_size(),
            rotation_degrees: default_watermark_rotation(),
            position: WatermarkPosition::default(),
            image: None,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectOptions {
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub prevent_copying: bool,
    #[serde(default)]
    pub prevent_printing: bool,
}

impl fmt::Debug for ProtectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectOptions")
            .field("password", &"<redacted>")
            .field("prevent_copying", &self.prevent_copying)
            .field("prevent_printing", &self.prevent_printing)
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockOptions {
    pub password: String,
}

impl fmt::Debug for UnlockOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnlockOptions")
            .field("password", &"<redacted>")
            .finish()
    }
}

fn from_json<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, ValidationError> {
    serde_json::from_value(value).map_err(|e| ValidationError::InvalidOptions(e.to_string()))
}

fn invalid(message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidOptions(message.into())
}

impl OperationOptions {
    /// Parse the wire form for `kind`. `null` is read as an empty object.
    pub fn parse(kind: OperationKind, value: serde_json::Value) -> Result<Self, ValidationError> {
        let value = if value.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            value
        };
        if !value.is_object() {
            return Err(invalid("options must be a JSON object"));
        }

        Ok(match kind {
            OperationKind::Merge => OperationOptions::Merge(from_json(value)?),
            OperationKind::Split => OperationOptions::Split(from_json(value)?),
            OperationKind::Compress => OperationOptions::Compress(from_json(value)?),
            OperationKind::ConvertTo => OperationOptions::ConvertTo(from_json(value)?),
            OperationKind::ConvertFrom => OperationOptions::ConvertFrom(from_json(value)?),
            OperationKind::Rotate => OperationOptions::Rotate(from_json(value)?),
            OperationKind::Watermark => OperationOptions::Watermark(from_json(value)?),
            OperationKind::Protect => OperationOptions::Protect(from_json(value)?),
            OperationKind::Unlock => OperationOptions::Unlock(from_json(value)?),
        })
    }

    /// Options for kinds whose every field has a default
    pub fn default_for(kind: OperationKind) -> Option<Self> {
        match kind {
            OperationKind::Merge => Some(OperationOptions::Merge(MergeOptions::default())),
            OperationKind::Compress => Some(OperationOptions::Compress(CompressOptions::default())),
            OperationKind::ConvertTo => {
                Some(OperationOptions::ConvertTo(ConvertToOptions::default()))
            }
            _ => None,
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            OperationOptions::Merge(_) => OperationKind::Merge,
            OperationOptions::Split(_) => OperationKind::Split,
            OperationOptions::Compress(_) => OperationKind::Compress,
            OperationOptions::ConvertTo(_) => OperationKind::ConvertTo,
            OperationOptions::ConvertFrom(_) => OperationKind::ConvertFrom,
            OperationOptions::Rotate(_) => OperationKind::Rotate,
            OperationOptions::Watermark(_) => OperationKind::Watermark,
            OperationOptions::Protect(_) => OperationKind::Protect,
            OperationOptions::Unlock(_) => OperationKind::Unlock,
        }
    }

    /// Watermark image that has to be uploaded alongside the inputs
    pub fn pending_image(&self) -> Option<&Arc<PendingFile>> {
        match self {
            OperationOptions::Watermark(options) => options.image.as_ref(),
            _ => None,
        }
    }

    /// Copy of these options with `imageRef` pointing at an uploaded image
    pub fn with_image_ref(&self, path: &str) -> Self {
        let mut options = self.clone();
        if let OperationOptions::Watermark(watermark) = &mut options {
            watermark.image_ref = Some(path.to_string());
        }
        options
    }

    /// Check the constraints serde cannot express
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            OperationOptions::Merge(_)
            | OperationOptions::Compress(_)
            | OperationOptions::ConvertTo(_) => Ok(()),
            OperationOptions::Split(SplitOptions::Range { ranges }) => {
                if ranges.is_empty() {
                    return Err(invalid("split needs at least one page range"));
                }
                for range in ranges {
                    if range.start == 0 {
                        return Err(invalid("page numbers start at 1"));
                    }
                    if range.start > range.end {
                        return Err(invalid(format!(
                            "range {}-{} ends before it starts",
                            range.start, range.end
                        )));
                    }
                }
                Ok(())
            }
            OperationOptions::Split(SplitOptions::Extract { pages }) => {
                validate_page_list(pages, "split needs at least one page to extract")
            }
            OperationOptions::ConvertFrom(options) => match &options.pages {
                Some(pages) => validate_page_list(pages, "page selection must not be empty"),
                None => Ok(()),
            },
            OperationOptions::Rotate(options) => {
                if options.degrees_by_page.keys().any(|page| *page == 0) {
                    return Err(invalid("page numbers start at 1"));
                }
                if options
                    .degrees_by_page
                    .values()
                    .all(|rotation| *rotation == Rotation::None)
                {
                    return Err(invalid("no page rotation selected"));
                }
                Ok(())
            }
            OperationOptions::Watermark(options) => validate_watermark(options),
            OperationOptions::Protect(options) => {
                if options.password.trim().is_empty() {
                    return Err(invalid("password must not be empty"));
                }
                if options.password != options.confirm_password {
                    return Err(invalid("passwords do not match"));
                }
                Ok(())
            }
            OperationOptions::Unlock(options) => {
                if options.password.trim().is_empty() {
                    return Err(invalid("password must not be empty"));
                }
                Ok(())
            }
        }
    }
}

fn validate_page_list(pages: &[u32], empty_message: &str) -> Result<(), ValidationError> {
    if pages.is_empty() {
        return Err(invalid(empty_message));
    }
    if pages.contains(&0) {
        return Err(invalid("page numbers start at 1"));
    }
    Ok(())
}

fn is_hex_color(color: &str) -> bool {
    match color.strip_prefix('#') {
        Some(digits) => digits.len() == 6 && digits.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

fn validate_watermark(options: &WatermarkOptions) -> Result<(), ValidationError> {
    match options.kind {
        WatermarkKind::Text => {
            let blank = options
                .text
                .as_deref()
                .map(|text| text.trim().is_empty())
                .unwrap_or(true);
            if blank {
                return Err(invalid("watermark text must not be empty"));
            }
            if !is_hex_color(&options.color) {
                return Err(invalid(format!(
                    "color must look like #RRGGBB, got {}",
                    options.color
                )));
            }
        }
        WatermarkKind::Image => {
            if options.image.is_none() && options.image_ref.is_none() {
                return Err(invalid("image watermark needs an image"));
            }
        }
    }
    if !(10..=100).contains(&options.opacity_percent) {
        return Err(invalid("opacity must be between 10 and 100 percent"));
    }
    if !(10..=100).contains(&options.size_percent) {
        return Err(invalid("size must be between 10 and 100 percent"));
    }
    if options.rotation_degrees > 360 || options.rotation_degrees % 15 != 0 {
        return Err(invalid("rotation must be a multiple of 15 between 0 and 360"));
    }
    Ok(())
}
