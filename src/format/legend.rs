//! Legend: bidirectional label ↔ class-id mapping for the text format.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use crate::format::error::{FormatError, LegendError};

/// Bidirectional mapping between label strings and small integer class ids.
///
/// Only the bounding-box text format uses class ids. A legend can come from a
/// legend file (line index = id), from an explicit set of pairs, or be built
/// lazily while saving (see [`LegendMode`]).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Legend {
    by_label: HashMap<String, u32>,
    by_id: HashMap<u32, String>,
}

impl Legend {
    /// Create an empty legend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a legend from an ordered list of labels; id = position.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut legend = Self::new();
        for (id, label) in labels.into_iter().enumerate() {
            legend.insert(label, id as u32);
        }
        legend
    }

    /// Build a legend from explicit (label, id) pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let mut legend = Self::new();
        for (label, id) in pairs {
            legend.insert(label, id);
        }
        legend
    }

    /// Load a legend file: one label per line, line index = class id.
    ///
    /// Lines that trim to empty keep their index but register no label.
    pub fn load(path: &Path) -> Result<Self, FormatError> {
        let content = std::fs::read_to_string(path)?;
        let mut legend = Self::new();
        for (id, line) in content.lines().enumerate() {
            let label = line.trim();
            if !label.is_empty() {
                legend.insert(label, id as u32);
            }
        }
        log::info!("Loaded legend with {} classes from {:?}", legend.len(), path);
        Ok(legend)
    }

    /// Register a label under the given id, replacing any previous entry for
    /// either side of the mapping.
    pub fn insert(&mut self, label: impl Into<String>, id: u32) {
        let label = label.into();
        if let Some(old_id) = self.by_label.insert(label.clone(), id) {
            self.by_id.remove(&old_id);
        }
        if let Some(old_label) = self.by_id.insert(id, label) {
            self.by_label.remove(&old_label);
        }
    }

    /// Class id for a label, if present.
    pub fn id_of(&self, label: &str) -> Option<u32> {
        self.by_label.get(label).copied()
    }

    /// Label for a class id, if present.
    pub fn label_of(&self, id: u32) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    /// Number of registered classes.
    pub fn len(&self) -> usize {
        self.by_label.len()
    }

    /// Whether the legend has no classes.
    pub fn is_empty(&self) -> bool {
        self.by_label.is_empty()
    }

    /// Next free class id: `max(existing) + 1`, or 0 when empty.
    pub fn next_id(&self) -> u32 {
        self.by_id.keys().max().map_or(0, |max| max + 1)
    }

    /// Look the label up, assigning the next free id if it is unseen.
    ///
    /// Ids grow monotonically and are never reused, even when the same label
    /// is resolved again later.
    pub fn assign(&mut self, label: &str) -> u32 {
        if let Some(id) = self.id_of(label) {
            return id;
        }
        let id = self.next_id();
        self.insert(label, id);
        id
    }

    /// Labels ordered ascending by class id.
    pub fn labels_by_id(&self) -> Vec<&str> {
        let mut entries: Vec<_> = self.by_id.iter().collect();
        entries.sort_by_key(|(id, _)| **id);
        entries.into_iter().map(|(_, label)| label.as_str()).collect()
    }

    /// Write the legend as a file: one label per line, ordered by id.
    pub fn write(&self, path: &Path) -> Result<(), FormatError> {
        let mut content = String::new();
        for label in self.labels_by_id() {
            let _ = writeln!(content, "{}", label);
        }
        std::fs::write(path, content)?;
        log::info!("Wrote legend with {} classes to {:?}", self.len(), path);
        Ok(())
    }
}

/// Class-id resolution policy used when encoding the text format.
///
/// The annotation source kept this as process-wide mutable state; here it is
/// an explicit value owned by whichever component performs saves, so batches
/// cannot leak legend state into each other.
#[derive(Debug, Clone)]
pub enum LegendMode {
    /// Fixed legend: an unresolvable label fails immediately with
    /// [`LegendError`]. Used for both a transient per-call legend and a
    /// session-wide output legend; the two differ only in how long the
    /// caller keeps the value around.
    Fixed(Legend),

    /// Self-generating legend: unseen labels get the next free id. Cannot
    /// fail. `pending_write` is set whenever a new id was assigned, telling
    /// the saver to write the sidecar legend file.
    Generate {
        /// Labels assigned so far.
        legend: Legend,
        /// Whether the sidecar legend file needs (re)writing.
        pending_write: bool,
    },
}

impl LegendMode {
    /// File name of the sidecar legend written next to generated text labels.
    pub const GENERATED_LEGEND_FILENAME: &'static str = "classes.txt";

    /// Create a self-generating mode starting from an empty legend.
    pub fn generating() -> Self {
        LegendMode::Generate {
            legend: Legend::new(),
            pending_write: false,
        }
    }

    /// Resolve a label to a class id under this policy.
    pub fn resolve(&mut self, label: &str) -> Result<u32, LegendError> {
        match self {
            LegendMode::Fixed(legend) => {
                legend.id_of(label).ok_or_else(|| LegendError::UnknownLabel {
                    label: label.to_string(),
                })
            }
            LegendMode::Generate {
                legend,
                pending_write,
            } => {
                if legend.id_of(label).is_none() {
                    *pending_write = true;
                }
                Ok(legend.assign(label))
            }
        }
    }

    /// The legend currently backing this mode.
    pub fn legend(&self) -> &Legend {
        match self {
            LegendMode::Fixed(legend) => legend,
            LegendMode::Generate { legend, .. } => legend,
        }
    }

    /// Take the generated legend for sidecar writing, clearing the pending
    /// flag. Returns `None` when nothing new was generated since last taken.
    pub fn take_pending_generated(&mut self) -> Option<&Legend> {
        match self {
            LegendMode::Generate {
                legend,
                pending_write,
            } if *pending_write => {
                *pending_write = false;
                Some(legend)
            }
            _ => None,
        }
    }
}
