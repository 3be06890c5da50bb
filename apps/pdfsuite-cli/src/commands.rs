//! Subcommands and their translation into run inputs and options

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use pdfsuite_core::{OperationKind, OperationOptions, PendingFile};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Combine PDFs in the given order
    Merge {
        #[arg(required = true, num_args = 2..)]
        files: Vec<PathBuf>,
    },
    /// Split a PDF into ranges or extract pages
    Split {
        file: PathBuf,
        /// One output per range, e.g. "1-3,4,5-9"
        #[arg(long, conflicts_with = "extract", required_unless_present = "extract")]
        ranges: Option<String>,
        /// A single output with these pages, e.g. "1,3,5-7"
        #[arg(long)]
        extract: Option<String>,
    },
    /// Reduce file size
    Compress {
        file: PathBuf,
        #[arg(long, default_value = "medium", value_parser = ["low", "medium", "high"])]
        level: String,
    },
    /// Convert images or office documents to PDF
    ConvertTo {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, default_value = "portrait", value_parser = ["portrait", "landscape"])]
        orientation: String,
        #[arg(long, default_value = "normal", value_parser = ["none", "normal", "wide"])]
        margin: String,
        /// One PDF per image instead of a combined document
        #[arg(long)]
        separate: bool,
    },
    /// Convert a PDF to another format
    ConvertFrom {
        file: PathBuf,
        #[arg(long, value_parser = ["docx", "jpg", "pptx"])]
        format: String,
        /// Pages to convert, e.g. "1-3,7"
        #[arg(long)]
        pages: Option<String>,
    },
    /// Rotate pages clockwise
    Rotate {
        file: PathBuf,
        /// PAGE=DEGREES, repeatable, e.g. --page 1=90 --page 3=180
        #[arg(long = "page", required = true, value_parser = parse_page_rotation)]
        pages: Vec<(u32, u16)>,
    },
    /// Stamp text or an image on every page
    Watermark {
        file: PathBuf,
        #[arg(long, conflicts_with = "image", required_unless_present = "image")]
        text: Option<String>,
        /// PNG or JPEG image to stamp
        #[arg(long)]
        image: Option<PathBuf>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        opacity: Option<u8>,
        #[arg(long)]
        size: Option<u8>,
        #[arg(long)]
        rotation: Option<u16>,
        /// e.g. center, top-left, bottom-right
        #[arg(long)]
        position: Option<String>,
    },
    /// Add a password
    Protect {
        file: PathBuf,
        #[arg(long)]
        password: String,
        #[arg(long)]
        prevent_copying: bool,
        #[arg(long)]
        prevent_printing: bool,
    },
    /// Remove a password
    Unlock {
        file: PathBuf,
        #[arg(long)]
        password: String,
    },
}

/// Everything needed to configure one run
#[derive(Debug)]
pub struct RunRequest {
    pub kind: OperationKind,
    pub inputs: Vec<PathBuf>,
    pub options: Option<OperationOptions>,
}

fn parse_page_rotation(value: &str) -> Result<(u32, u16), String> {
    let (page, degrees) = value
        .split_once('=')
        .ok_or_else(|| format!("expected PAGE=DEGREES, got {}", value))?;
    let page = page
        .trim()
        .parse()
        .map_err(|_| format!("invalid page number: {}", page))?;
    let degrees = degrees
        .trim()
        .parse()
        .map_err(|_| format!("invalid degrees: {}", degrees))?;
    Ok((page, degrees))
}

/// Parse "1-3,5" into inclusive ranges, keeping the given order
pub fn parse_page_ranges(text: &str) -> Result<Vec<(u32, u32)>> {
    let mut ranges = Vec::new();
    for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (start, end) = match part.split_once('-') {
            Some((start, end)) => (start.trim(), end.trim()),
            None => (part, part),
        };
        let start: u32 = start.parse().with_context(|| format!("invalid page: {}", start))?;
        let end: u32 = end.parse().with_context(|| format!("invalid page: {}", end))?;
        ranges.push((start, end));
    }
    if ranges.is_empty() {
        bail!("no pages in {:?}", text);
    }
    Ok(ranges)
}

fn page_list(text: &str) -> Result<Vec<u32>> {
    Ok(parse_page_ranges(text)?
        .into_iter()
        .flat_map(|(start, end)| start..=end)
        .collect())
}

fn insert_some(map: &mut Map<String, Value>, key: &str, value: Option<impl Into<Value>>) {
    if let Some(value) = value {
        map.insert(key.to_string(), value.into());
    }
}

/// Read a file from disk, guessing its media type from the extension
pub fn load_file(path: &Path) -> Result<PendingFile> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let media_type = mime_guess::from_path(path).first_or_octet_stream();
    Ok(PendingFile::new(name, media_type.essence_str(), bytes)?)
}

impl Command {
    pub fn kind(&self) -> OperationKind {
        match self {
            Command::Merge { .. } => OperationKind::Merge,
            Command::Split { .. } => OperationKind::Split,
            Command::Compress { .. } => OperationKind::Compress,
            Command::ConvertTo { .. } => OperationKind::ConvertTo,
            Command::ConvertFrom { .. } => OperationKind::ConvertFrom,
            Command::Rotate { .. } => OperationKind::Rotate,
            Command::Watermark { .. } => OperationKind::Watermark,
            Command::Protect { .. } => OperationKind::Protect,
            Command::Unlock { .. } => OperationKind::Unlock,
        }
    }

    /// Options in wire form; parsed by the same rules the server uses
    fn options_json(&self) -> Result<Value> {
        Ok(match self {
            Command::Merge { .. } => json!({}),
            Command::Split {
                ranges: Some(ranges),
                ..
            } => {
                let ranges: Vec<Value> = parse_page_ranges(ranges)?
                    .into_iter()
                    .map(|(start, end)| json!({ "start": start, "end": end }))
                    .collect();
                json!({ "mode": "range", "ranges": ranges })
            }
            Command::Split { extract, .. } => {
                let pages = page_list(extract.as_deref().unwrap_or_default())?;
                json!({ "mode": "extract", "pages": pages })
            }
            Command::Compress { level, .. } => json!({ "compressionLevel": level }),
            Command::ConvertTo {
                orientation,
                margin,
                separate,
                ..
            } => json!({
                "orientation": orientation,
                "margin": margin,
                "combineImages": !separate,
            }),
            Command::ConvertFrom { format, pages, .. } => {
                let mut options = json!({ "format": format });
                if let Some(pages) = pages {
                    options["pages"] = json!(page_list(pages)?);
                }
                options
            }
            Command::Rotate { pages, .. } => {
                let degrees: Map<String, Value> = pages
                    .iter()
                    .map(|(page, degrees)| (page.to_string(), json!(degrees)))
                    .collect();
                json!({ "degreesByPage": degrees })
            }
            Command::Watermark {
                text,
                image,
                color,
                opacity,
                size,
                rotation,
                position,
                ..
            } => {
                let mut options = Map::new();
                let kind = if image.is_some() { "image" } else { "text" };
                options.insert("kind".into(), json!(kind));
                insert_some(&mut options, "text", text.clone());
                insert_some(&mut options, "color", color.clone());
                insert_some(&mut options, "opacityPercent", *opacity);
                insert_some(&mut options, "sizePercent", *size);
                insert_some(&mut options, "rotationDegrees", *rotation);
                insert_some(&mut options, "position", position.clone());
                Value::Object(options)
            }
            Command::Protect {
                password,
                prevent_copying,
                prevent_printing,
                ..
            } => json!({
                "password": password,
                "confirmPassword": password,
                "preventCopying": prevent_copying,
                "preventPrinting": prevent_printing,
            }),
            Command::Unlock { password, .. } => json!({ "password": password }),
        })
    }

    fn input_paths(&self) -> Vec<PathBuf> {
        match self {
            Command::Merge { files } | Command::ConvertTo { files, .. } => files.clone(),
            Command::Split { file, .. }
            | Command::Compress { file, .. }
            | Command::ConvertFrom { file, .. }
            | Command::Rotate { file, .. }
            | Command::Watermark { file, .. }
            | Command::Protect { file, .. }
            | Command::Unlock { file, .. } => vec![file.clone()],
        }
    }

    pub fn into_request(self) -> Result<RunRequest> {
        let kind = self.kind();
        let mut options = OperationOptions::parse(kind, self.options_json()?)?;

        if let (Command::Watermark { image: Some(path), .. }, OperationOptions::Watermark(watermark)) =
            (&self, &mut options)
        {
            watermark.image = Some(Arc::new(load_file(path)?));
        }

        Ok(RunRequest {
            kind,
            inputs: self.input_paths(),
            options: Some(options),
        })
    }
}
