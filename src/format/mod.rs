//! Label file format codecs and batch persistence.
//!
//! Three codecs share the [`crate::model`] types but not a common call
//! signature, since each format needs different context to decode (the native
//! format resolves image paths, the text format resolves class ids through a
//! legend, the video format addresses a single frame). The closed set of
//! formats is captured by [`LabelFormat`], which the batch layer dispatches
//! on.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use labelfile::format::{BBoxTextCodec, Legend, LegendMode};
//!
//! let legend = Legend::load(&classes_path)?;
//! let shapes = BBoxTextCodec::decode(&bytes, 640, 480, &legend)?;
//! ```

mod batch;
mod error;
pub mod formats;
mod image_data;
mod legend;

pub use batch::{BatchOutcome, BatchSaver, ImageBuffer, SaveSettings};
pub use error::{FormatError, LegendError, SaveError};
pub use formats::{
    BBoxTextCodec, EncodeOptions, LabelFormat, NativeJsonCodec, VideoJsonCodec,
};
pub use legend::{Legend, LegendMode};
