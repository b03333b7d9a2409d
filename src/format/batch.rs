//! Batch persistence of per-image annotation buffers.
//!
//! The UI keeps one [`ImageBuffer`] per opened image and hands the whole
//! collection to [`BatchSaver`] when saving. The saver owns the dirty
//! bookkeeping, dispatches to the codec selected by [`SaveSettings`], and
//! implements the rollback policy for mid-batch legend failures.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::format::error::{FormatError, SaveError};
use crate::format::formats::{BBoxTextCodec, EncodeOptions, LabelFormat, NativeJsonCodec};
use crate::format::image_data;
use crate::format::legend::LegendMode;
use crate::model::{AnnotationDocument, Shape};

/// One image's in-memory annotation state.
#[derive(Debug, Clone, Default)]
pub struct ImageBuffer {
    /// Annotated regions.
    pub shapes: Vec<Shape>,

    /// Image-level boolean flags.
    pub flags: HashMap<String, bool>,

    /// Image dimensions (width, height) in pixels.
    pub image_size: (u32, u32),

    /// Whether the buffer has unsaved changes.
    pub dirty: bool,

    /// Whether a label file for this image was written and is still
    /// considered current. The UI surfaces this as a checkmark.
    pub has_label_file: bool,
}

impl ImageBuffer {
    /// Create a clean, empty buffer for an image of the given size.
    pub fn new(image_width: u32, image_height: u32) -> Self {
        Self {
            image_size: (image_width, image_height),
            ..Self::default()
        }
    }

    /// Set the shape list and mark the buffer dirty.
    pub fn with_shapes(mut self, shapes: Vec<Shape>) -> Self {
        self.shapes = shapes;
        self.dirty = true;
        self
    }

    /// Whether there is anything worth saving.
    pub fn has_content(&self) -> bool {
        !self.shapes.is_empty() || !self.flags.is_empty()
    }
}

/// Where and how a batch is saved.
///
/// The legend lives here rather than in process-wide state, so the legend
/// resolution policy is fixed per settings value and two batches can never
/// leak class ids into each other.
#[derive(Debug)]
pub struct SaveSettings {
    /// Output format. Must be writable.
    pub format: LabelFormat,

    /// Directory label files are written into. Created on demand.
    pub output_dir: PathBuf,

    /// Embed image bytes when the native format is used.
    pub with_image_data: bool,

    /// Class-id resolution policy for the text format.
    pub legend: LegendMode,
}

impl SaveSettings {
    /// Create settings for the given format and output directory, with a
    /// self-generating legend and no embedded image data.
    pub fn new(format: LabelFormat, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            format,
            output_dir: output_dir.into(),
            with_image_data: false,
            legend: LegendMode::generating(),
        }
    }

    /// Set the legend resolution policy.
    pub fn with_legend(mut self, legend: LegendMode) -> Self {
        self.legend = legend;
        self
    }

    /// Set whether the native format embeds image bytes.
    pub fn with_image_data(mut self, embed: bool) -> Self {
        self.with_image_data = embed;
        self
    }
}

/// Result of a whole-batch save.
#[derive(Debug)]
pub enum BatchOutcome {
    /// Every eligible entry was saved.
    Completed {
        /// Number of entries written in this batch.
        saved: usize,
    },

    /// The caller canceled between entries. Entries already saved stay
    /// saved; there is no rollback on cancellation.
    Canceled {
        /// Number of entries written before cancellation.
        saved: usize,
    },

    /// An entry failed and the batch stopped there.
    Failed {
        /// Image path of the failing entry.
        failed: PathBuf,
        /// The error that stopped the batch.
        error: SaveError,
        /// Number of entries written before the failure.
        saved_before_failure: usize,
        /// True when the failure was a legend error and the batch's dirty
        /// bookkeeping was rolled back. Files already on disk are valid for
        /// the legend they were written with and are left in place.
        rolled_back: bool,
    },
}

impl BatchOutcome {
    /// Whether the batch ran to completion.
    pub fn is_complete(&self) -> bool {
        matches!(self, BatchOutcome::Completed { .. })
    }
}

/// Coordinates saving many images' annotation buffers.
///
/// Entries iterate in insertion order, which makes batch behavior (stop
/// point, rollback extent) deterministic.
#[derive(Debug, Default)]
pub struct BatchSaver {
    entries: Vec<(PathBuf, ImageBuffer)>,
    index: HashMap<PathBuf, usize>,
}

impl BatchSaver {
    /// Create an empty saver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the buffer for an image.
    pub fn insert(&mut self, image_path: impl Into<PathBuf>, buffer: ImageBuffer) {
        let image_path = image_path.into();
        match self.index.get(&image_path) {
            Some(&i) => self.entries[i].1 = buffer,
            None => {
                self.index.insert(image_path.clone(), self.entries.len());
                self.entries.push((image_path, buffer));
            }
        }
    }

    /// Buffer for an image, if tracked.
    pub fn get(&self, image_path: &Path) -> Option<&ImageBuffer> {
        self.index.get(image_path).map(|&i| &self.entries[i].1)
    }

    /// Mutable buffer for an image, if tracked.
    pub fn get_mut(&mut self, image_path: &Path) -> Option<&mut ImageBuffer> {
        self.index
            .get(image_path)
            .map(|&i| &mut self.entries[i].1)
    }

    /// Number of tracked images.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no images are tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Path, &ImageBuffer)> {
        self.entries.iter().map(|(p, b)| (p.as_path(), b))
    }

    /// Save a single image's buffer.
    ///
    /// On success the buffer is marked clean and "has label file". A
    /// [`FormatError`] leaves the buffer dirty; a legend failure propagates
    /// as [`SaveError::Legend`] so callers can offer legend remediation.
    /// Returns the path of the written label file.
    pub fn save_one(
        &mut self,
        image_path: &Path,
        settings: &mut SaveSettings,
    ) -> Result<PathBuf, SaveError> {
        let entry_idx = *self.index.get(image_path).ok_or_else(|| {
            FormatError::invalid_format(format!("no buffered annotations for {:?}", image_path))
        })?;

        let dest = label_file_path(image_path, settings)?;
        std::fs::create_dir_all(&settings.output_dir).map_err(FormatError::from)?;

        let buffer = &self.entries[entry_idx].1;
        let (image_width, image_height) = buffer.image_size;
        match settings.format {
            LabelFormat::NativeJson => {
                let mut doc = AnnotationDocument::new(
                    relative_image_path(image_path, &settings.output_dir),
                    image_width,
                    image_height,
                );
                doc.shapes = buffer.shapes.clone();
                doc.flags = buffer.flags.clone();
                if settings.with_image_data {
                    // Failing to read the image downgrades to a label file
                    // without embedded bytes; the annotations still save.
                    match image_data::load_image_bytes(image_path) {
                        Ok(bytes) => doc.image_data = Some(bytes),
                        Err(err) => {
                            log::error!("Could not read image data of {:?}: {}", image_path, err)
                        }
                    }
                }
                let options = EncodeOptions::new().with_image_data(settings.with_image_data);
                let bytes = NativeJsonCodec::encode(&doc, &options)?;
                std::fs::write(&dest, bytes).map_err(FormatError::from)?;
            }
            LabelFormat::BoundingBoxText => {
                // Encode fully before touching the destination, so a legend
                // failure leaves no partial file behind.
                let bytes =
                    BBoxTextCodec::encode(&buffer.shapes, image_width, image_height, &mut settings.legend)?;
                std::fs::write(&dest, bytes).map_err(FormatError::from)?;

                if let Some(legend) = settings.legend.take_pending_generated() {
                    let legend_path = settings
                        .output_dir
                        .join(LegendMode::GENERATED_LEGEND_FILENAME);
                    if let Err(err) = legend.write(&legend_path) {
                        log::error!("Could not save generated legend file: {}", err);
                    }
                }
            }
            LabelFormat::ExternalVideoJson => {
                return Err(FormatError::UnsupportedOperation(
                    "the external video format is read-only".into(),
                )
                .into());
            }
        }

        let buffer = &mut self.entries[entry_idx].1;
        buffer.dirty = false;
        buffer.has_label_file = true;
        log::info!("Saved {:?} -> {:?}", image_path, dest);
        Ok(dest)
    }

    /// Save every dirty entry that has shapes or flags, in insertion order.
    ///
    /// Stops at the first failure. A legend failure additionally rolls back
    /// the dirty bookkeeping of everything saved earlier in this batch,
    /// because those files were written against an inconsistent class
    /// mapping; the files themselves are left on disk. `should_cancel` is
    /// polled between entries only.
    pub fn save_all(
        &mut self,
        settings: &mut SaveSettings,
        should_cancel: impl FnMut() -> bool,
    ) -> BatchOutcome {
        self.run_batch(settings, true, should_cancel)
    }

    /// Save every entry that has shapes or flags, dirty or not.
    ///
    /// Same iteration and rollback semantics as [`Self::save_all`]; intended
    /// for "save all as" with one-off settings (different directory, format,
    /// or transient legend) that leave the session settings untouched.
    pub fn save_all_as(
        &mut self,
        settings: &mut SaveSettings,
        should_cancel: impl FnMut() -> bool,
    ) -> BatchOutcome {
        self.run_batch(settings, false, should_cancel)
    }

    fn run_batch(
        &mut self,
        settings: &mut SaveSettings,
        require_dirty: bool,
        mut should_cancel: impl FnMut() -> bool,
    ) -> BatchOutcome {
        let mut saved: Vec<usize> = Vec::new();

        for i in 0..self.entries.len() {
            if should_cancel() {
                log::info!("Batch save canceled after {} entries", saved.len());
                return BatchOutcome::Canceled { saved: saved.len() };
            }

            let (path, buffer) = &self.entries[i];
            if (require_dirty && !buffer.dirty) || !buffer.has_content() {
                continue;
            }
            let path = path.clone();

            match self.save_one(&path, settings) {
                Ok(_) => saved.push(i),
                Err(error) => {
                    let rolled_back = error.is_legend_error();
                    if rolled_back {
                        self.roll_back(&saved);
                    }
                    log::error!(
                        "Batch save failed at {:?}: {} (rolled back: {})",
                        path,
                        error,
                        rolled_back
                    );
                    return BatchOutcome::Failed {
                        failed: path,
                        error,
                        saved_before_failure: saved.len(),
                        rolled_back,
                    };
                }
            }
        }

        log::info!("Batch save completed: {} entries written", saved.len());
        BatchOutcome::Completed { saved: saved.len() }
    }

    /// Restore the dirty bookkeeping of entries saved earlier in a failed
    /// batch. Their files stay on disk; only the session state is reset.
    fn roll_back(&mut self, saved: &[usize]) {
        for &i in saved {
            let buffer = &mut self.entries[i].1;
            buffer.dirty = true;
            buffer.has_label_file = false;
        }
    }
}

/// Destination label file: output dir + image stem + format extension.
fn label_file_path(image_path: &Path, settings: &SaveSettings) -> Result<PathBuf, FormatError> {
    let stem = image_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            FormatError::invalid_format(format!("image path {:?} has no file stem", image_path))
        })?;
    Ok(settings
        .output_dir
        .join(format!("{}.{}", stem, settings.format.extension())))
}

/// Image path as recorded inside a native label file: relative to the output
/// directory, walking up through `..` components where needed. Paths of
/// mixed absoluteness cannot be related and are recorded unchanged.
fn relative_image_path(image_path: &Path, output_dir: &Path) -> PathBuf {
    use std::path::Component;

    if image_path.is_absolute() != output_dir.is_absolute() {
        return image_path.to_path_buf();
    }

    let path_comps: Vec<Component<'_>> = image_path.components().collect();
    let base_comps: Vec<Component<'_>> = output_dir.components().collect();
    let mut common = 0;
    while common < path_comps.len()
        && common < base_comps.len()
        && path_comps[common] == base_comps[common]
    {
        common += 1;
    }

    let mut rel = PathBuf::new();
    for _ in common..base_comps.len() {
        rel.push("..");
    }
    for comp in &path_comps[common..] {
        rel.push(comp.as_os_str());
    }
    rel
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::legend::{Legend, LegendMode};
    use crate::model::GeometryKind;

    fn buffer_with_rect(label: &str) -> ImageBuffer {
        ImageBuffer::new(100, 100)
            .with_shapes(vec![Shape::rectangle(label, (10.0, 10.0), (40.0, 40.0))])
    }

    fn text_settings(dir: &Path, legend: LegendMode) -> SaveSettings {
        SaveSettings::new(LabelFormat::BoundingBoxText, dir).with_legend(legend)
    }

    #[test]
    fn test_save_one_text_format() {
        let dir = tempfile::tempdir().unwrap();
        let mut saver = BatchSaver::new();
        saver.insert("/data/img1.png", buffer_with_rect("person"));

        let mut settings = text_settings(dir.path(), LegendMode::generating());
        let dest = saver
            .save_one(Path::new("/data/img1.png"), &mut settings)
            .unwrap();

        assert_eq!(dest, dir.path().join("img1.txt"));
        let content = std::fs::read_to_string(&dest).unwrap();
        assert!(content.starts_with("0 "));

        let buffer = saver.get(Path::new("/data/img1.png")).unwrap();
        assert!(!buffer.dirty);
        assert!(buffer.has_label_file);

        // Generated legend sidecar was written next to the labels.
        let legend = std::fs::read_to_string(dir.path().join("classes.txt")).unwrap();
        assert_eq!(legend, "person\n");
    }

    #[test]
    fn test_legend_failure_leaves_destination_unwritten() {
        let dir = tempfile::tempdir().unwrap();
        let mut saver = BatchSaver::new();
        saver.insert("/data/img1.png", buffer_with_rect("dog"));

        let mut settings =
            text_settings(dir.path(), LegendMode::Fixed(Legend::from_labels(["person"])));
        let err = saver
            .save_one(Path::new("/data/img1.png"), &mut settings)
            .unwrap_err();

        assert!(err.is_legend_error());
        assert!(!dir.path().join("img1.txt").exists());
        assert!(saver.get(Path::new("/data/img1.png")).unwrap().dirty);
    }

    #[test]
    fn test_save_all_rolls_back_on_legend_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut saver = BatchSaver::new();
        saver.insert("/data/img1.png", buffer_with_rect("person"));
        saver.insert("/data/img2.png", buffer_with_rect("dog"));
        saver.insert("/data/img3.png", buffer_with_rect("person"));

        let mut settings =
            text_settings(dir.path(), LegendMode::Fixed(Legend::from_labels(["person"])));
        let outcome = saver.save_all(&mut settings, || false);

        match outcome {
            BatchOutcome::Failed {
                failed,
                error,
                saved_before_failure,
                rolled_back,
            } => {
                assert_eq!(failed, PathBuf::from("/data/img2.png"));
                assert!(error.is_legend_error());
                assert_eq!(saved_before_failure, 1);
                assert!(rolled_back);
            }
            other => panic!("expected Failed outcome, got {:?}", other),
        }

        // Entry 1 was re-dirtied and its checkmark cleared...
        let first = saver.get(Path::new("/data/img1.png")).unwrap();
        assert!(first.dirty);
        assert!(!first.has_label_file);
        // ...but its file is still on disk: the write is not undone.
        assert!(dir.path().join("img1.txt").exists());
        // Entry 3 was never reached.
        assert!(saver.get(Path::new("/data/img3.png")).unwrap().dirty);
        assert!(!dir.path().join("img3.txt").exists());
    }

    #[test]
    fn test_save_all_format_failure_no_rollback() {
        let dir = tempfile::tempdir().unwrap();
        let mut saver = BatchSaver::new();
        saver.insert("/data/img1.png", buffer_with_rect("person"));
        // An image path with no stem cannot produce a label file name.
        saver.insert("/data/..", buffer_with_rect("person"));

        let mut settings = text_settings(dir.path(), LegendMode::generating());
        let outcome = saver.save_all(&mut settings, || false);

        match outcome {
            BatchOutcome::Failed { rolled_back, .. } => assert!(!rolled_back),
            other => panic!("expected Failed outcome, got {:?}", other),
        }
        // The first entry keeps its clean state on a plain format error.
        let first = saver.get(Path::new("/data/img1.png")).unwrap();
        assert!(!first.dirty);
        assert!(first.has_label_file);
    }

    #[test]
    fn test_save_all_skips_clean_and_empty_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut saver = BatchSaver::new();

        let mut clean = buffer_with_rect("person");
        clean.dirty = false;
        saver.insert("/data/clean.png", clean);
        saver.insert("/data/empty.png", {
            let mut b = ImageBuffer::new(100, 100);
            b.dirty = true;
            b
        });
        saver.insert("/data/dirty.png", buffer_with_rect("person"));

        let mut settings = text_settings(dir.path(), LegendMode::generating());
        let outcome = saver.save_all(&mut settings, || false);

        assert!(matches!(outcome, BatchOutcome::Completed { saved: 1 }));
        assert!(!dir.path().join("clean.txt").exists());
        assert!(!dir.path().join("empty.txt").exists());
        assert!(dir.path().join("dirty.txt").exists());
    }

    #[test]
    fn test_save_all_as_ignores_dirty_flag() {
        let dir = tempfile::tempdir().unwrap();
        let mut saver = BatchSaver::new();
        let mut clean = buffer_with_rect("person");
        clean.dirty = false;
        saver.insert("/data/clean.png", clean);

        let mut settings = text_settings(dir.path(), LegendMode::generating());
        let outcome = saver.save_all_as(&mut settings, || false);

        assert!(matches!(outcome, BatchOutcome::Completed { saved: 1 }));
        assert!(dir.path().join("clean.txt").exists());
    }

    #[test]
    fn test_cancellation_keeps_saved_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut saver = BatchSaver::new();
        saver.insert("/data/img1.png", buffer_with_rect("person"));
        saver.insert("/data/img2.png", buffer_with_rect("person"));

        // Cancel before the second entry.
        let mut calls = 0;
        let mut settings = text_settings(dir.path(), LegendMode::generating());
        let outcome = saver.save_all(&mut settings, || {
            calls += 1;
            calls > 1
        });

        assert!(matches!(outcome, BatchOutcome::Canceled { saved: 1 }));
        // No rollback on cancellation: entry 1 stays clean and saved.
        let first = saver.get(Path::new("/data/img1.png")).unwrap();
        assert!(!first.dirty);
        assert!(first.has_label_file);
        assert!(dir.path().join("img1.txt").exists());
    }

    #[test]
    fn test_save_one_native_format_records_relative_image_path() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("images").join("img1.png");
        let output_dir = dir.path().join("labels");

        let mut saver = BatchSaver::new();
        saver.insert(&image_path, buffer_with_rect("person"));

        let mut settings = SaveSettings::new(LabelFormat::NativeJson, &output_dir);
        let dest = saver.save_one(&image_path, &mut settings).unwrap();

        assert_eq!(dest, output_dir.join("img1.json"));
        let root: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&dest).unwrap()).unwrap();
        assert_eq!(root["imagePath"], serde_json::json!("../images/img1.png"));
        assert_eq!(root["imageData"], serde_json::Value::Null);
        assert_eq!(root["imageWidth"], serde_json::json!(100));
        assert_eq!(root["shapes"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_relative_image_path() {
        assert_eq!(
            relative_image_path(Path::new("/data/images/a.png"), Path::new("/data/labels")),
            PathBuf::from("../images/a.png")
        );
        assert_eq!(
            relative_image_path(Path::new("/data/labels/a.png"), Path::new("/data/labels")),
            PathBuf::from("a.png")
        );
        // Mixed absoluteness cannot be related.
        assert_eq!(
            relative_image_path(Path::new("images/a.png"), Path::new("/labels")),
            PathBuf::from("images/a.png")
        );
    }

    #[test]
    fn test_video_format_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut saver = BatchSaver::new();
        saver.insert("/data/img1.png", buffer_with_rect("person"));

        let mut settings = SaveSettings::new(LabelFormat::ExternalVideoJson, dir.path());
        let err = saver
            .save_one(Path::new("/data/img1.png"), &mut settings)
            .unwrap_err();
        assert!(matches!(
            err,
            SaveError::Format(FormatError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_insert_replaces_existing_entry() {
        let mut saver = BatchSaver::new();
        saver.insert("/data/img1.png", buffer_with_rect("person"));
        saver.insert("/data/img1.png", buffer_with_rect("car"));

        assert_eq!(saver.len(), 1);
        assert_eq!(
            saver.get(Path::new("/data/img1.png")).unwrap().shapes[0].label,
            "car"
        );
    }

    #[test]
    fn test_session_legend_is_shared_across_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut saver = BatchSaver::new();
        saver.insert("/data/img1.png", buffer_with_rect("person"));
        saver.insert("/data/img2.png", buffer_with_rect("car"));
        saver.insert(
            "/data/img3.png",
            ImageBuffer::new(100, 100).with_shapes(vec![
                Shape::rectangle("person", (0.0, 0.0), (10.0, 10.0)),
                Shape::new("sky", GeometryKind::Polygon).with_points(vec![
                    (0.0, 0.0),
                    (1.0, 0.0),
                    (1.0, 1.0),
                ]),
            ]),
        );

        let mut settings = text_settings(dir.path(), LegendMode::generating());
        let outcome = saver.save_all(&mut settings, || false);
        assert!(outcome.is_complete());

        // One id per distinct label, assigned in encounter order, polygon
        // skipped without consuming an id.
        assert_eq!(settings.legend.legend().id_of("person"), Some(0));
        assert_eq!(settings.legend.legend().id_of("car"), Some(1));
        assert_eq!(settings.legend.legend().id_of("sky"), None);

        let legend = std::fs::read_to_string(dir.path().join("classes.txt")).unwrap();
        assert_eq!(legend, "person\ncar\n");
    }
}
