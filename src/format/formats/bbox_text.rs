//! Normalized bounding-box text format.
//!
//! One line per box: `classId xCenter yCenter width height`, the four
//! geometric fields normalized to `[0, 1]` by the image dimensions. Class
//! ids are resolved through a [`Legend`]; the format itself stores no label
//! strings.

use std::fmt::Write as _;

use crate::format::error::{FormatError, LegendError};
use crate::format::legend::{Legend, LegendMode};
use crate::model::Shape;

/// Bounding-box text codec.
pub struct BBoxTextCodec;

impl BBoxTextCodec {
    /// Decode a text label file into rectangle shapes.
    ///
    /// Normalized coordinates are scaled by the image dimensions and the box
    /// corners integer-truncated. A class id outside the legend degrades to
    /// the stringified id as label; it is never an error.
    pub fn decode(
        bytes: &[u8],
        image_width: u32,
        image_height: u32,
        legend: &Legend,
    ) -> Result<Vec<Shape>, FormatError> {
        let content = std::str::from_utf8(bytes)
            .map_err(|_| FormatError::invalid_format("label file is not valid UTF-8"))?;

        let mut shapes = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            shapes.push(decode_line(line, image_width, image_height, legend)?);
        }
        Ok(shapes)
    }

    /// Encode shapes as text lines, resolving labels through `legend`.
    ///
    /// Only two-corner rectangles are encodable; every other shape is
    /// skipped. That is format policy, not data loss worth failing over: the
    /// text format simply has no representation for other geometry. Line
    /// order matches shape order.
    ///
    /// Under a fixed legend an unresolvable label fails with [`LegendError`]
    /// before any output is produced.
    pub fn encode(
        shapes: &[Shape],
        image_width: u32,
        image_height: u32,
        legend: &mut LegendMode,
    ) -> Result<Vec<u8>, LegendError> {
        let mut out = String::new();
        for shape in shapes {
            if !shape.is_corner_rectangle() {
                log::debug!(
                    "Skipping non-rectangle shape '{}' ({:?}) for text export",
                    shape.label,
                    shape.kind
                );
                continue;
            }
            let class_id = legend.resolve(&shape.label)?;

            let (x1, y1) = shape.points[0];
            let (x2, y2) = shape.points[1];
            let x_center = (x1 + x2) / 2.0 / f64::from(image_width);
            let y_center = (y1 + y2) / 2.0 / f64::from(image_height);
            let width = (x2 - x1).abs() / f64::from(image_width);
            let height = (y2 - y1).abs() / f64::from(image_height);

            let _ = writeln!(
                out,
                "{} {:.6} {:.6} {:.6} {:.6}",
                class_id, x_center, y_center, width, height
            );
        }
        Ok(out.into_bytes())
    }
}

fn decode_line(
    line: &str,
    image_width: u32,
    image_height: u32,
    legend: &Legend,
) -> Result<Shape, FormatError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() != 5 {
        return Err(FormatError::invalid_format(format!(
            "expected 5 fields per line, got {}",
            parts.len()
        )));
    }

    let class_id: i64 = parts[0]
        .parse()
        .map_err(|_| FormatError::invalid_format(format!("invalid class id '{}'", parts[0])))?;
    let mut fields = [0.0f64; 4];
    for (slot, token) in fields.iter_mut().zip(&parts[1..]) {
        *slot = token.parse().map_err(|_| {
            FormatError::invalid_format(format!("invalid coordinate '{}'", token))
        })?;
    }

    let x_center = fields[0] * f64::from(image_width);
    let y_center = fields[1] * f64::from(image_height);
    let box_width = fields[2] * f64::from(image_width);
    let box_height = fields[3] * f64::from(image_height);

    let x1 = (x_center - box_width / 2.0).trunc();
    let y1 = (y_center - box_height / 2.0).trunc();
    let x2 = (x_center + box_width / 2.0).trunc();
    let y2 = (y_center + box_height / 2.0).trunc();

    // Ids the legend does not cover fall back to the stringified id; unknown
    // classes degrade gracefully instead of failing the whole file.
    let label = u32::try_from(class_id)
        .ok()
        .and_then(|id| legend.label_of(id))
        .map(str::to_string)
        .unwrap_or_else(|| class_id.to_string());

    Ok(Shape::rectangle(label, (x1, y1), (x2, y2)))
}
