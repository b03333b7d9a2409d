//! External per-video annotation export (read-only).
//!
//! Decodes a third-party tracking export into one frame's shapes at a time.
//! The file covers the whole video; the caller works on an extracted frame
//! sequence and addresses frames by their index within that sequence.

use serde::Deserialize;

use crate::format::error::FormatError;
use crate::model::Shape;

#[derive(Debug, Deserialize)]
struct VideoTask {
    #[serde(default)]
    annotations: Vec<TaskAnnotation>,
}

#[derive(Debug, Deserialize)]
struct TaskAnnotation {
    #[serde(default)]
    result: Vec<TrackedObject>,
}

#[derive(Debug, Deserialize)]
struct TrackedObject {
    value: TrackValue,
}

#[derive(Debug, Deserialize)]
struct TrackValue {
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    sequence: Vec<FrameBox>,
    #[serde(rename = "framesCount", default)]
    frames_count: f64,
}

/// One keyframe of a tracked object. Coordinates are percentages of the
/// image dimensions, origin top-left.
#[derive(Debug, Deserialize)]
struct FrameBox {
    frame: i64,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

/// External video JSON codec (decode only; the format is never written).
pub struct VideoJsonCodec;

impl VideoJsonCodec {
    /// Decode the shapes visible in one frame of the sequence.
    ///
    /// `frame_index` addresses the caller's extracted frame sequence of
    /// `frames_in_sequence` frames; the matching absolute video frame is
    /// computed from the export's total frame count. Objects without an
    /// entry for that frame are simply not visible there and are omitted.
    ///
    /// Each object's `sequence` is assumed sorted ascending by frame number
    /// (producer guarantee); lookup is by binary search.
    pub fn decode(
        bytes: &[u8],
        image_width: u32,
        image_height: u32,
        frame_index: usize,
        frames_in_sequence: usize,
    ) -> Result<Vec<Shape>, FormatError> {
        let objects = tracked_objects(bytes)?;
        if objects.is_empty() {
            // A video with nothing annotated is a valid, empty export.
            return Ok(Vec::new());
        }
        if frames_in_sequence == 0 {
            return Err(FormatError::invalid_format(
                "frame sequence length must be nonzero",
            ));
        }

        let total_frames = objects[0].value.frames_count;
        let interval = (total_frames / frames_in_sequence as f64).round() as i64;
        let target_frame = frame_index as i64 * interval + 1;

        let mut shapes = Vec::new();
        for (ordinal, obj) in objects.iter().enumerate() {
            let Some(idx) = frame_position(&obj.value.sequence, target_frame) else {
                continue;
            };
            let label = obj
                .value
                .labels
                .first()
                .ok_or_else(|| FormatError::missing_field("result[].value.labels"))?;

            let (p1, p2) = pixel_corners(&obj.value.sequence[idx], image_width, image_height);
            shapes.push(Shape::rectangle(label, p1, p2).with_group_id(ordinal as i64));
        }

        log::debug!(
            "Decoded {} of {} tracked objects for frame {} (video frame {})",
            shapes.len(),
            objects.len(),
            frame_index,
            target_frame
        );
        Ok(shapes)
    }

    /// Number of tracked objects in the export.
    pub fn count_objects(bytes: &[u8]) -> Result<usize, FormatError> {
        Ok(tracked_objects(bytes)?.len())
    }
}

fn tracked_objects(bytes: &[u8]) -> Result<Vec<TrackedObject>, FormatError> {
    let mut tasks: Vec<VideoTask> = serde_json::from_slice(bytes)?;
    let task = if tasks.is_empty() {
        return Err(FormatError::invalid_format("export contains no tasks"));
    } else {
        tasks.swap_remove(0)
    };
    let mut annotations = task.annotations;
    if annotations.is_empty() {
        return Err(FormatError::missing_field("annotations"));
    }
    Ok(annotations.swap_remove(0).result)
}

/// Binary search for the sequence entry of an exact frame number.
fn frame_position(sequence: &[FrameBox], target: i64) -> Option<usize> {
    let (mut low, mut high) = (0isize, sequence.len() as isize - 1);
    while low <= high {
        let mid = (low + high) / 2;
        let frame = sequence[mid as usize].frame;
        if frame == target {
            return Some(mid as usize);
        } else if frame < target {
            low = mid + 1;
        } else {
            high = mid - 1;
        }
    }
    None
}

/// Percent coordinates to integer-truncated pixel corners.
fn pixel_corners(frame: &FrameBox, image_width: u32, image_height: u32) -> ((f64, f64), (f64, f64)) {
    let x = (f64::from(image_width) * frame.x / 100.0).trunc();
    let y = (f64::from(image_height) * frame.y / 100.0).trunc();
    let width = (f64::from(image_width) * frame.width / 100.0).trunc();
    let height = (f64::from(image_height) * frame.height / 100.0).trunc();
    ((x, y), (x + width, y + height))
}
