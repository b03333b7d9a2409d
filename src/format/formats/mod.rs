//! Codec implementations, one per on-disk annotation schema.

mod bbox_text;
mod native_json;
mod video_json;

#[cfg(test)]
mod tests;

pub use bbox_text::BBoxTextCodec;
pub use native_json::{EncodeOptions, NativeJsonCodec};
pub use video_json::VideoJsonCodec;

/// The closed set of label file formats.
///
/// Save/load paths dispatch on this enum explicitly; file extensions alone
/// cannot distinguish the native format from the external video format, so
/// the video variant is only ever selected by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelFormat {
    /// Native labelme-compatible JSON, full fidelity, read/write.
    NativeJson,
    /// Normalized bounding-box text format, rectangles only, read/write.
    BoundingBoxText,
    /// Third-party per-video annotation export, read-only.
    ExternalVideoJson,
}

impl LabelFormat {
    /// File extension (without the dot) used by this format.
    pub fn extension(&self) -> &'static str {
        match self {
            LabelFormat::NativeJson | LabelFormat::ExternalVideoJson => "json",
            LabelFormat::BoundingBoxText => "txt",
        }
    }

    /// Human-readable name for UI display.
    pub fn display_name(&self) -> &'static str {
        match self {
            LabelFormat::NativeJson => "Labelme (JSON)",
            LabelFormat::BoundingBoxText => "YOLO (TXT)",
            LabelFormat::ExternalVideoJson => "Video annotations (JSON)",
        }
    }

    /// Map a file extension to its default format.
    ///
    /// `.json` maps to the native format; the video format shares the
    /// extension and must be chosen explicitly.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "json" => Some(LabelFormat::NativeJson),
            "txt" => Some(LabelFormat::BoundingBoxText),
            _ => None,
        }
    }

    /// Whether this format can be written.
    pub fn supports_write(&self) -> bool {
        !matches!(self, LabelFormat::ExternalVideoJson)
    }

    /// Whether this format can represent non-rectangular geometry.
    pub fn supports_polygon(&self) -> bool {
        matches!(self, LabelFormat::NativeJson)
    }

    /// Whether encoding with this format needs a class-id legend.
    pub fn needs_legend(&self) -> bool {
        matches!(self, LabelFormat::BoundingBoxText)
    }
}
