//! Per-image annotation document.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::model::Shape;

/// One image's full annotation set.
///
/// This is the unit the codecs encode and decode. `image_path` is stored the
/// way it appears in the label file (usually relative to the label file's
/// directory); `image_data` holds the raw image bytes when they are embedded
/// in or loaded alongside the document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnnotationDocument {
    /// Path of the annotated image as recorded in the label file.
    pub image_path: PathBuf,

    /// Image width in pixels.
    pub image_width: u32,

    /// Image height in pixels.
    pub image_height: u32,

    /// Raw image bytes, present when the file embeds them or after decode
    /// loaded them from `image_path`.
    pub image_data: Option<Vec<u8>>,

    /// Annotated regions.
    pub shapes: Vec<Shape>,

    /// Image-level boolean flags.
    pub flags: HashMap<String, bool>,

    /// Unrecognized top-level keys, preserved verbatim on round-trip.
    pub other_data: serde_json::Map<String, serde_json::Value>,
}

impl AnnotationDocument {
    /// Create an empty document for the given image.
    pub fn new(image_path: impl Into<PathBuf>, image_width: u32, image_height: u32) -> Self {
        Self {
            image_path: image_path.into(),
            image_width,
            image_height,
            ..Self::default()
        }
    }

    /// Set the shape list.
    pub fn with_shapes(mut self, shapes: Vec<Shape>) -> Self {
        self.shapes = shapes;
        self
    }

    /// Set the embedded image bytes.
    pub fn with_image_data(mut self, image_data: Vec<u8>) -> Self {
        self.image_data = Some(image_data);
        self
    }

    /// All group (track) ids currently in use by this document's shapes.
    ///
    /// The UI uses this to keep track ids unique when assigning new ones.
    pub fn group_ids(&self) -> Vec<i64> {
        self.shapes.iter().filter_map(|s| s.group_id).collect()
    }

    /// Whether the document has any shapes or image-level flags.
    pub fn has_content(&self) -> bool {
        !self.shapes.is_empty() || !self.flags.is_empty()
    }
}
