//! labelfile - annotation persistence for labelme-style image datasets.
//!
//! This crate implements the label-file interchange layer of an image/video
//! annotation tool: a plain shape/document model and codecs for three
//! incompatible on-disk annotation schemas.
//!
//! ## Supported formats
//!
//! - **Native JSON**: labelme-compatible per-image files with full fidelity
//!   (all geometry kinds, masks, passthrough keys)
//! - **Bounding-box TXT**: one line per box with normalized coordinates,
//!   class ids resolved through a [`Legend`]
//! - **External video JSON**: read-only import of third-party per-video
//!   tracking exports, one frame at a time
//!
//! ## Usage
//!
//! ```rust,ignore
//! use labelfile::{BatchSaver, LabelFormat, LegendMode, SaveSettings};
//!
//! let mut saver = BatchSaver::new();
//! saver.insert(image_path, buffer);
//!
//! let mut settings = SaveSettings::new(LabelFormat::BoundingBoxText, output_dir)
//!     .with_legend(LegendMode::generating());
//! let outcome = saver.save_all(&mut settings, || false);
//! ```

pub mod format;
pub mod model;

pub use format::{
    BBoxTextCodec, BatchOutcome, BatchSaver, EncodeOptions, FormatError, ImageBuffer, LabelFormat,
    Legend, LegendError, LegendMode, NativeJsonCodec, SaveError, SaveSettings, VideoJsonCodec,
};
pub use model::{AnnotationDocument, GeometryKind, Shape};
