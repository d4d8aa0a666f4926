//! Derivative file naming.
//!
//! An original `<stem>.<ext>` has derivatives `<stem>w<W>.<ext>` (scaled to
//! width W) and `<stem>w<W>h<H>.<ext>` (cropped to fill W×H). Originals must
//! have exactly one dot and a stem that does not itself read as a derivative,
//! which keeps parsing a derivative name back unambiguous.

use std::fmt;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Size {
    /// Scale to this width, keeping the aspect ratio.
    Width(u32),
    /// Scale and crop to fill exactly this box.
    Crop { width: u32, height: u32 },
}

impl Size {
    /// Map request dimensions to a derivative size. A zero or missing width
    /// means the original; a height without a width is ignored.
    pub fn from_request(width: Option<u32>, height: Option<u32>) -> Option<Size> {
        match (width.filter(|w| *w > 0), height.filter(|h| *h > 0)) {
            (Some(width), Some(height)) => Some(Size::Crop { width, height }),
            (Some(width), None) => Some(Size::Width(width)),
            (None, _) => None,
        }
    }

    fn marker(&self) -> String {
        match self {
            Size::Width(w) => format!("w{w}"),
            Size::Crop { width, height } => format!("w{width}h{height}"),
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Size::Width(w) => write!(f, "{w}w"),
            Size::Crop { width, height } => write!(f, "{width}x{height}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OriginalName {
    stem: String,
    ext: String,
}

impl OriginalName {
    pub fn parse(filename: &str) -> Result<Self> {
        let invalid = |reason| CoreError::InvalidFilename {
            name: filename.to_string(),
            reason,
        };
        if filename.is_empty() {
            return Err(invalid("empty"));
        }
        if filename.contains(['/', '\\', '\0']) {
            return Err(invalid("contains a path separator"));
        }
        if filename.starts_with('.') {
            return Err(invalid("hidden file"));
        }
        let (stem, ext) = filename
            .split_once('.')
            .ok_or_else(|| invalid("missing extension"))?;
        if ext.is_empty() || ext.contains('.') {
            return Err(invalid("must have exactly one extension"));
        }
        if split_marker(stem).is_some() {
            return Err(invalid("reads as a derivative name"));
        }
        Ok(Self {
            stem: stem.to_string(),
            ext: ext.to_string(),
        })
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.stem, self.ext)
    }

    pub fn derivative(&self, size: Size) -> String {
        format!("{}{}.{}", self.stem, size.marker(), self.ext)
    }
}

impl fmt::Display for OriginalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.stem, self.ext)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivativeName {
    pub original: OriginalName,
    pub size: Size,
}

impl DerivativeName {
    /// Recover the original and size from a derivative file name, or `None`
    /// if the name carries no derivative marker.
    pub fn parse(filename: &str) -> Option<Self> {
        let (stem, ext) = filename.split_once('.')?;
        if stem.is_empty() || ext.is_empty() || ext.contains('.') {
            return None;
        }
        let (base, size) = split_marker(stem)?;
        Some(Self {
            original: OriginalName {
                stem: base.to_string(),
                ext: ext.to_string(),
            },
            size,
        })
    }
}

fn split_marker(stem: &str) -> Option<(&str, Size)> {
    let at = stem.rfind('w')?;
    let (base, rest) = (&stem[..at], &stem[at + 1..]);
    if base.is_empty() {
        return None;
    }
    let size = match rest.split_once('h') {
        Some((w, h)) => Size::Crop {
            width: dimension(w)?,
            height: dimension(h)?,
        },
        None => Size::Width(dimension(rest)?),
    };
    Some((base, size))
}

/// Canonical positive decimal only, so names round-trip.
fn dimension(s: &str) -> Option<u32> {
    if s.is_empty() || s.starts_with('0') || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
