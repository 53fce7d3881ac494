use log::debug;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::{ConvertError, Result};
use crate::types::{AnnotationRecord, ImageLabelRecord};

fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| ConvertError::csv(path, e))?;
    let records = reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(|e| ConvertError::csv(path, e))?;
    debug!("Read {} rows from {}", records.len(), path.display());
    Ok(records)
}

/// Load the box rows of an annotations CSV.
pub fn load_annotations(path: &Path) -> Result<Vec<AnnotationRecord>> {
    read_csv(path)
}

/// Load the rows of an image labels CSV.
pub fn load_image_labels(path: &Path) -> Result<Vec<ImageLabelRecord>> {
    read_csv(path)
}

/// Distinct image ids in first-occurrence order.
pub fn distinct_image_ids(labels: &[ImageLabelRecord]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(labels.len());
    labels
        .iter()
        .filter(|label| seen.insert(label.image_id.as_str()))
        .map(|label| label.image_id.clone())
        .collect()
}

/// Annotation rows grouped by image id, in source order within each group.
#[derive(Debug, Default)]
pub struct AnnotationIndex {
    by_image: HashMap<String, Vec<AnnotationRecord>>,
    record_count: usize,
}

impl AnnotationIndex {
    pub fn from_records(records: Vec<AnnotationRecord>) -> Self {
        let record_count = records.len();
        let mut by_image: HashMap<String, Vec<AnnotationRecord>> = HashMap::new();
        for record in records {
            by_image
                .entry(record.image_id.clone())
                .or_default()
                .push(record);
        }
        Self {
            by_image,
            record_count,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::from_records(load_annotations(path)?))
    }

    /// Rows for `image_id`; empty when the image has none.
    pub fn get(&self, image_id: &str) -> &[AnnotationRecord] {
        self.by_image
            .get(image_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn image_count(&self) -> usize {
        self.by_image.len()
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }
}
