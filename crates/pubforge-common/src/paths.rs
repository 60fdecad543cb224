//! Path utilities for classifying files by extension.
//!
//! Collectors use [`classify`] to pick the `file.*` type spec of an item.

use std::fmt;
use std::path::Path;

/// List of supported image file extensions.
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff", "exr", "dpx", "tga", "psd",
];

/// List of supported video file extensions.
const VIDEO_EXTENSIONS: &[&str] = &["mov", "mp4", "mkv", "avi", "m4v", "webm", "mxf"];

/// List of supported audio file extensions.
const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "aac", "flac", "aiff", "ogg"];

/// List of supported geometry/cache file extensions.
const GEOMETRY_EXTENSIONS: &[&str] = &["abc", "fbx", "obj", "usd", "usda", "usdc", "vdb"];

/// List of supported document file extensions.
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "odt"];

/// List of supported plain-text file extensions.
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "json", "yml", "yaml", "toml", "csv"];

/// Broad content category of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Image,
    Video,
    Audio,
    Geometry,
    Document,
    Text,
    Other,
}

impl FileKind {
    /// The dotted type spec used for items of this kind.
    pub fn type_spec(self) -> &'static str {
        match self {
            Self::Image => "file.image",
            Self::Video => "file.video",
            Self::Audio => "file.audio",
            Self::Geometry => "file.geometry",
            Self::Document => "file.document",
            Self::Text => "file.text",
            Self::Other => "file",
        }
    }

    /// Human label for items of this kind.
    pub fn display(self) -> &'static str {
        match self {
            Self::Image => "Image File",
            Self::Video => "Movie File",
            Self::Audio => "Audio File",
            Self::Geometry => "Geometry File",
            Self::Document => "Document",
            Self::Text => "Text File",
            Self::Other => "File",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

/// Lowercased extension of a path, if any.
pub fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
}

/// Classify a path by its extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use pubforge_common::paths::{classify, FileKind};
///
/// assert_eq!(classify(Path::new("shot_010.mov")), FileKind::Video);
/// assert_eq!(classify(Path::new("/cache/char.ABC")), FileKind::Geometry);
/// assert_eq!(classify(Path::new("README")), FileKind::Other);
/// ```
pub fn classify(path: &Path) -> FileKind {
    let Some(ext) = extension(path) else {
        return FileKind::Other;
    };
    let ext = ext.as_str();

    if IMAGE_EXTENSIONS.contains(&ext) {
        FileKind::Image
    } else if VIDEO_EXTENSIONS.contains(&ext) {
        FileKind::Video
    } else if AUDIO_EXTENSIONS.contains(&ext) {
        FileKind::Audio
    } else if GEOMETRY_EXTENSIONS.contains(&ext) {
        FileKind::Geometry
    } else if DOCUMENT_EXTENSIONS.contains(&ext) {
        FileKind::Document
    } else if TEXT_EXTENSIONS.contains(&ext) {
        FileKind::Text
    } else {
        FileKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_kinds() {
        assert_eq!(classify(Path::new("a.png")), FileKind::Image);
        assert_eq!(classify(Path::new("a.EXR")), FileKind::Image);
        assert_eq!(classify(Path::new("a.mov")), FileKind::Video);
        assert_eq!(classify(Path::new("a.wav")), FileKind::Audio);
        assert_eq!(classify(Path::new("a.usd")), FileKind::Geometry);
        assert_eq!(classify(Path::new("a.pdf")), FileKind::Document);
        assert_eq!(classify(Path::new("a.txt")), FileKind::Text);
    }

    #[test]
    fn test_edge_cases() {
        assert_eq!(classify(Path::new("")), FileKind::Other);
        assert_eq!(classify(Path::new(".hidden")), FileKind::Other);
        assert_eq!(classify(Path::new("archive.tar.zst")), FileKind::Other);
    }

    #[test]
    fn test_type_specs() {
        assert_eq!(FileKind::Image.type_spec(), "file.image");
        assert_eq!(FileKind::Other.type_spec(), "file");
        assert_eq!(FileKind::Video.to_string(), "Movie File");
    }
}
