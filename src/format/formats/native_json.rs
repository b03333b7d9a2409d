//! Native labelme-compatible JSON format.
//!
//! The only format with full fidelity: every geometry kind, per-shape masks,
//! embedded image bytes, and verbatim round-trip of unrecognized keys at both
//! the document and the shape level.

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Map, Value};

use crate::format::error::FormatError;
use crate::format::image_data;
use crate::model::{AnnotationDocument, GeometryKind, Shape};

/// Version string written into the `version` field of saved files.
pub const FORMAT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Top-level keys owned by the format; everything else is passthrough.
const RESERVED_KEYS: &[&str] = &[
    "version",
    "flags",
    "shapes",
    "imagePath",
    "imageData",
    "imageHeight",
    "imageWidth",
];

/// Per-shape keys owned by the format; everything else is passthrough.
const SHAPE_KEYS: &[&str] = &[
    "label",
    "points",
    "group_id",
    "shape_type",
    "flags",
    "description",
    "mask",
];

/// Options for encoding the native format.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeOptions {
    /// Embed the document's image bytes as base64 `imageData`. When false,
    /// `imageData` is written as null and readers resolve `imagePath`.
    pub with_image_data: bool,
}

impl EncodeOptions {
    /// Create options with defaults (no embedded image data).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether image bytes are embedded.
    pub fn with_image_data(mut self, embed: bool) -> Self {
        self.with_image_data = embed;
        self
    }
}

/// Native JSON codec.
pub struct NativeJsonCodec;

impl NativeJsonCodec {
    /// Decode a native label file.
    ///
    /// `base_path` is the path of the label file itself; a relative
    /// `imagePath` is resolved against its directory when no `imageData` is
    /// embedded. Declared image dimensions are cross-checked against the
    /// actual image and silently repaired on mismatch.
    pub fn decode(bytes: &[u8], base_path: &Path) -> Result<AnnotationDocument, FormatError> {
        let root: Value = serde_json::from_slice(bytes)?;
        let root = root
            .as_object()
            .ok_or_else(|| FormatError::invalid_format("top level must be a JSON object"))?;

        let image_data = match root.get("imageData") {
            Some(Value::String(encoded)) => BASE64.decode(encoded)?,
            Some(Value::Null) | None => {
                let image_path = root
                    .get("imagePath")
                    .and_then(Value::as_str)
                    .ok_or_else(|| FormatError::missing_field("imagePath"))?;
                let dir = base_path.parent().unwrap_or_else(|| Path::new(""));
                image_data::load_image_bytes(&dir.join(image_path))?
            }
            Some(_) => {
                return Err(FormatError::invalid_format(
                    "imageData must be a base64 string or null",
                ));
            }
        };

        let (actual_width, actual_height) = image_data::image_dimensions(&image_data)?;
        let image_width = check_dimension("imageWidth", root.get("imageWidth"), actual_width);
        let image_height = check_dimension("imageHeight", root.get("imageHeight"), actual_height);

        let raw_shapes = root
            .get("shapes")
            .ok_or_else(|| FormatError::missing_field("shapes"))?
            .as_array()
            .ok_or_else(|| FormatError::invalid_format("shapes must be an array"))?;

        let mut shapes = Vec::with_capacity(raw_shapes.len());
        for raw in raw_shapes {
            if let Some(shape) = decode_shape(raw)? {
                shapes.push(shape);
            }
        }

        let mut doc = AnnotationDocument::new(
            root.get("imagePath").and_then(Value::as_str).unwrap_or(""),
            image_width,
            image_height,
        );
        doc.image_data = Some(image_data);
        doc.shapes = shapes;
        doc.flags = decode_flags(root.get("flags"));
        for (key, value) in root {
            if !RESERVED_KEYS.contains(&key.as_str()) {
                doc.other_data.insert(key.clone(), value.clone());
            }
        }

        log::debug!(
            "Decoded native label file {:?}: {} shapes, {}x{}",
            base_path,
            doc.shapes.len(),
            doc.image_width,
            doc.image_height
        );
        Ok(doc)
    }

    /// Encode a document as native JSON bytes.
    ///
    /// Passthrough keys are re-serialized at their original level; a
    /// passthrough key shadowing a reserved key is a programmer error and
    /// fails with [`FormatError::ReservedKey`].
    pub fn encode(
        doc: &AnnotationDocument,
        options: &EncodeOptions,
    ) -> Result<Vec<u8>, FormatError> {
        for key in doc.other_data.keys() {
            if RESERVED_KEYS.contains(&key.as_str()) {
                return Err(FormatError::ReservedKey { key: key.clone() });
            }
        }

        // When image bytes are at hand the stored dimensions must agree with
        // them; the actual image wins on mismatch, same as on decode.
        let (mut image_width, mut image_height) = (doc.image_width, doc.image_height);
        if let Some(data) = &doc.image_data {
            let (actual_width, actual_height) = image_data::image_dimensions(data)?;
            if image_width != actual_width {
                log::warn!(
                    "imageWidth {} does not match actual image width {}, correcting",
                    image_width,
                    actual_width
                );
                image_width = actual_width;
            }
            if image_height != actual_height {
                log::warn!(
                    "imageHeight {} does not match actual image height {}, correcting",
                    image_height,
                    actual_height
                );
                image_height = actual_height;
            }
        }

        let image_data_value = match (&doc.image_data, options.with_image_data) {
            (Some(data), true) => Value::String(BASE64.encode(data)),
            _ => Value::Null,
        };

        let mut shapes = Vec::with_capacity(doc.shapes.len());
        for shape in &doc.shapes {
            shapes.push(encode_shape(shape)?);
        }

        let mut root = Map::new();
        root.insert("version".into(), Value::String(FORMAT_VERSION.into()));
        root.insert("flags".into(), encode_flags(&doc.flags));
        root.insert("shapes".into(), Value::Array(shapes));
        root.insert(
            "imagePath".into(),
            Value::String(doc.image_path.to_string_lossy().into_owned()),
        );
        root.insert("imageData".into(), image_data_value);
        root.insert("imageHeight".into(), Value::from(image_height));
        root.insert("imageWidth".into(), Value::from(image_width));
        for (key, value) in &doc.other_data {
            root.insert(key.clone(), value.clone());
        }

        Ok(serde_json::to_vec_pretty(&Value::Object(root))?)
    }
}

/// Reconcile a declared dimension with the measured one. Mismatches are
/// repaired from the image, not reported as errors.
fn check_dimension(field: &str, declared: Option<&Value>, actual: u32) -> u32 {
    match declared.and_then(Value::as_u64) {
        Some(declared) if declared != u64::from(actual) => {
            log::warn!(
                "{} {} does not match the actual image ({}), using the image",
                field,
                declared,
                actual
            );
            actual
        }
        _ => actual,
    }
}

fn decode_flags(value: Option<&Value>) -> std::collections::HashMap<String, bool> {
    value
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_bool().map(|b| (k.clone(), b)))
                .collect()
        })
        .unwrap_or_default()
}

fn encode_flags(flags: &std::collections::HashMap<String, bool>) -> Value {
    Value::Object(
        flags
            .iter()
            .map(|(k, v)| (k.clone(), Value::Bool(*v)))
            .collect(),
    )
}

/// Decode one shape entry. Returns `Ok(None)` for shapes with an empty point
/// list, which are dropped rather than rejected.
fn decode_shape(raw: &Value) -> Result<Option<Shape>, FormatError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| FormatError::invalid_format("shape entry must be an object"))?;

    let label = obj
        .get("label")
        .and_then(Value::as_str)
        .ok_or_else(|| FormatError::missing_field("shapes[].label"))?;
    if label.trim().is_empty() {
        return Err(FormatError::invalid_format("shape label is empty"));
    }

    let points = decode_points(
        obj.get("points")
            .ok_or_else(|| FormatError::missing_field("shapes[].points"))?,
    )?;
    if points.is_empty() {
        log::warn!("Dropping shape '{}' with no points", label);
        return Ok(None);
    }

    let kind = match obj.get("shape_type").and_then(Value::as_str) {
        Some(name) => GeometryKind::from_name(name).unwrap_or_else(|| {
            log::warn!("Unknown shape_type '{}', treating as polygon", name);
            GeometryKind::Polygon
        }),
        None => GeometryKind::Polygon,
    };

    let mask = match obj.get("mask") {
        Some(Value::String(encoded)) => Some(image_data::decode_mask(encoded)?),
        _ => None,
    };

    let mut shape = Shape::new(label, kind).with_points(points);
    shape.group_id = obj.get("group_id").and_then(Value::as_i64);
    shape.description = obj
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string);
    shape.flags = decode_flags(obj.get("flags"));
    shape.mask = mask;
    for (key, value) in obj {
        if !SHAPE_KEYS.contains(&key.as_str()) {
            shape.other_data.insert(key.clone(), value.clone());
        }
    }
    Ok(Some(shape))
}

fn decode_points(value: &Value) -> Result<Vec<(f64, f64)>, FormatError> {
    let entries = value
        .as_array()
        .ok_or_else(|| FormatError::invalid_format("points must be an array"))?;
    let mut points = Vec::with_capacity(entries.len());
    for entry in entries {
        let pair = entry
            .as_array()
            .filter(|p| p.len() >= 2)
            .ok_or_else(|| FormatError::invalid_format("point must be an [x, y] pair"))?;
        let x = pair[0]
            .as_f64()
            .ok_or_else(|| FormatError::invalid_format("point coordinate must be a number"))?;
        let y = pair[1]
            .as_f64()
            .ok_or_else(|| FormatError::invalid_format("point coordinate must be a number"))?;
        points.push((x, y));
    }
    Ok(points)
}

fn encode_shape(shape: &Shape) -> Result<Value, FormatError> {
    for key in shape.other_data.keys() {
        if SHAPE_KEYS.contains(&key.as_str()) {
            return Err(FormatError::ReservedKey { key: key.clone() });
        }
    }

    let mut points = Vec::with_capacity(shape.points.len());
    for &(x, y) in &shape.points {
        points.push(Value::Array(vec![number(x)?, number(y)?]));
    }

    let mut obj = Map::new();
    obj.insert("label".into(), Value::String(shape.label.clone()));
    obj.insert("points".into(), Value::Array(points));
    obj.insert(
        "group_id".into(),
        shape.group_id.map_or(Value::Null, Value::from),
    );
    obj.insert("shape_type".into(), Value::String(shape.kind.as_str().into()));
    obj.insert("flags".into(), encode_flags(&shape.flags));
    obj.insert(
        "description".into(),
        shape
            .description
            .as_ref()
            .map_or(Value::Null, |d| Value::String(d.clone())),
    );
    obj.insert(
        "mask".into(),
        match &shape.mask {
            Some(mask) => Value::String(image_data::encode_mask(mask)?),
            None => Value::Null,
        },
    );
    for (key, value) in &shape.other_data {
        obj.insert(key.clone(), value.clone());
    }
    Ok(Value::Object(obj))
}

fn number(value: f64) -> Result<Value, FormatError> {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| FormatError::invalid_format("point coordinate is not finite"))
}
