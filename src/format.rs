//! Supported format registry and file-name helpers.

use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Broad media category a format belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Vector,
    Document,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Vector => write!(f, "vector"),
            MediaKind::Document => write!(f, "document"),
        }
    }
}

/// A supported file format, identified by its lowercase extension.
///
/// Formats only come from the static registry, so two tags with the same
/// extension are always identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Format {
    extension: &'static str,
    kind: MediaKind,
    mime_type: &'static str,
}

impl Format {
    pub const JPG: Format = Format::new("jpg", MediaKind::Image, "image/jpeg");
    pub const JPEG: Format = Format::new("jpeg", MediaKind::Image, "image/jpeg");
    pub const PNG: Format = Format::new("png", MediaKind::Image, "image/png");
    pub const BMP: Format = Format::new("bmp", MediaKind::Image, "image/bmp");

    pub const FLV: Format = Format::new("flv", MediaKind::Video, "video/x-flv");
    pub const MOV: Format = Format::new("mov", MediaKind::Video, "video/quicktime");
    pub const MP4: Format = Format::new("mp4", MediaKind::Video, "video/mp4");
    pub const AVI: Format = Format::new("avi", MediaKind::Video, "video/x-msvideo");

    pub const WAV: Format = Format::new("wav", MediaKind::Audio, "audio/wav");
    pub const MP3: Format = Format::new("mp3", MediaKind::Audio, "audio/mpeg");
    pub const THREE_GP: Format = Format::new("3gp", MediaKind::Audio, "audio/3gpp");
    // "3gg" is accepted as a spelling of 3gp.
    pub const THREE_GG: Format = Format::new("3gg", MediaKind::Audio, "audio/3gpp");
    pub const MID: Format = Format::new("mid", MediaKind::Audio, "audio/midi");
    pub const MIDI: Format = Format::new("midi", MediaKind::Audio, "audio/midi");

    pub const SVG: Format = Format::new("svg", MediaKind::Vector, "image/svg+xml");
    pub const PDF: Format = Format::new("pdf", MediaKind::Document, "application/pdf");

    const fn new(extension: &'static str, kind: MediaKind, mime_type: &'static str) -> Self {
        Self {
            extension,
            kind,
            mime_type,
        }
    }

    /// Every format the service knows about.
    pub fn all() -> &'static [Format] {
        &REGISTRY
    }

    /// Sorted list of supported extensions, as reported to clients.
    pub fn supported_extensions() -> Vec<&'static str> {
        let mut extensions: Vec<&'static str> = REGISTRY.iter().map(|f| f.extension).collect();
        extensions.sort_unstable();
        extensions
    }

    /// Looks up a client supplied token such as `"PNG"`, `".png"` or `" mp3 "`.
    pub fn from_token(token: &str) -> Option<Format> {
        let normalized = normalize_token(token);
        if normalized.is_empty() {
            return None;
        }
        REGISTRY.iter().copied().find(|f| f.extension == normalized)
    }

    /// Looks up the format implied by a file name's extension.
    pub fn from_file_name(file_name: &str) -> Option<Format> {
        Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_token)
    }

    pub fn extension(&self) -> &'static str {
        self.extension
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    /// Extension with aliases folded together (`jpeg` -> `jpg`, `midi` -> `mid`).
    pub fn canonical(&self) -> &'static str {
        match self.extension {
            "jpeg" => "jpg",
            "midi" => "mid",
            "3gg" => "3gp",
            other => other,
        }
    }

    /// True when both tags name the same encoding.
    pub fn same_encoding(&self, other: &Format) -> bool {
        self.canonical() == other.canonical()
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension)
    }
}

static REGISTRY: [Format; 16] = [
    Format::JPG,
    Format::JPEG,
    Format::PNG,
    Format::BMP,
    Format::FLV,
    Format::MOV,
    Format::MP4,
    Format::AVI,
    Format::WAV,
    Format::MP3,
    Format::THREE_GP,
    Format::THREE_GG,
    Format::MID,
    Format::MIDI,
    Format::SVG,
    Format::PDF,
];

/// Lowercases a format token and strips surrounding whitespace and leading dots.
pub fn normalize_token(token: &str) -> String {
    token.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Reduces an uploaded file name to a safe single path component.
///
/// Directory parts are dropped, whitespace becomes `_`, and anything other
/// than ASCII alphanumerics, `.`, `-` and `_` is removed.
pub fn sanitize_file_name(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('_')
            } else if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                Some(c)
            } else {
                None
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Name of the converted file: the source stem with the target extension.
pub fn output_file_name(source_name: &str, target: Format) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("converted");
    format!("{}.{}", stem, target.extension())
}
