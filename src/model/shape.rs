//! Shape types for annotated regions.

use std::collections::HashMap;

use ndarray::Array2;

/// Geometry kind of an annotated region.
///
/// The kind determines how the point list is interpreted. A rectangle is
/// stored as its two opposite corners; all other kinds carry their vertices
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    /// Closed polygon defined by its vertices.
    Polygon,
    /// Axis-aligned box stored as two opposite corner points.
    Rectangle,
    /// Circle stored as center point and one point on the perimeter.
    Circle,
    /// Straight line segment between two points.
    Line,
    /// Open polyline through the listed points.
    LineStrip,
    /// Single point marker.
    Point,
}

impl GeometryKind {
    /// Name used in the native JSON format's `shape_type` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryKind::Polygon => "polygon",
            GeometryKind::Rectangle => "rectangle",
            GeometryKind::Circle => "circle",
            GeometryKind::Line => "line",
            GeometryKind::LineStrip => "linestrip",
            GeometryKind::Point => "point",
        }
    }

    /// Parse a `shape_type` string from the native format.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "polygon" => Some(GeometryKind::Polygon),
            "rectangle" => Some(GeometryKind::Rectangle),
            "circle" => Some(GeometryKind::Circle),
            "line" => Some(GeometryKind::Line),
            "linestrip" => Some(GeometryKind::LineStrip),
            "point" => Some(GeometryKind::Point),
            _ => None,
        }
    }

    /// Exact point count required by this kind, if it has one.
    ///
    /// Rectangles are always two corner points. The other kinds only require
    /// a non-empty point list at the codec layer; their full arity rules live
    /// in the drawing layer.
    pub fn required_points(&self) -> Option<usize> {
        match self {
            GeometryKind::Rectangle => Some(2),
            GeometryKind::Point => Some(1),
            _ => None,
        }
    }
}

impl Default for GeometryKind {
    fn default() -> Self {
        GeometryKind::Polygon
    }
}

/// One annotated region of an image.
///
/// Points are pixel coordinates in the image's own coordinate space with the
/// origin at the top-left corner.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Shape {
    /// Label string. Required and non-empty after trimming.
    pub label: String,

    /// Geometry kind, controls the interpretation of `points`.
    pub kind: GeometryKind,

    /// Ordered vertex list in pixel coordinates.
    pub points: Vec<(f64, f64)>,

    /// Cross-frame/cross-image track identifier.
    pub group_id: Option<i64>,

    /// Free-form boolean tags.
    pub flags: HashMap<String, bool>,

    /// Optional free-form description.
    pub description: Option<String>,

    /// Optional per-pixel mask aligned with the shape's bounding points.
    /// Only the native JSON format carries masks.
    pub mask: Option<Array2<bool>>,

    /// Unrecognized per-shape keys, preserved verbatim on round-trip.
    pub other_data: serde_json::Map<String, serde_json::Value>,
}

impl Shape {
    /// Create a new shape with the given label and geometry kind.
    pub fn new(label: impl Into<String>, kind: GeometryKind) -> Self {
        Self {
            label: label.into(),
            kind,
            ..Self::default()
        }
    }

    /// Create a rectangle shape from two opposite corner points.
    pub fn rectangle(label: impl Into<String>, p1: (f64, f64), p2: (f64, f64)) -> Self {
        Self::new(label, GeometryKind::Rectangle).with_points(vec![p1, p2])
    }

    /// Set the point list.
    pub fn with_points(mut self, points: Vec<(f64, f64)>) -> Self {
        self.points = points;
        self
    }

    /// Set the group (track) id.
    pub fn with_group_id(mut self, group_id: i64) -> Self {
        self.group_id = Some(group_id);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether this shape is a well-formed two-corner rectangle.
    ///
    /// The bounding-box text format can only represent these.
    pub fn is_corner_rectangle(&self) -> bool {
        self.kind == GeometryKind::Rectangle && self.points.len() == 2
    }

    /// Whether the point list satisfies the kind's arity requirement.
    pub fn has_valid_arity(&self) -> bool {
        match self.kind.required_points() {
            Some(n) => self.points.len() == n,
            None => !self.points.is_empty(),
        }
    }
}
