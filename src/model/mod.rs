//! Annotation data model shared by all codecs.

mod document;
mod shape;

pub use document::AnnotationDocument;
pub use shape::{GeometryKind, Shape};
