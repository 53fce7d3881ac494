//! Ordered class lists and the name → id lookup baked into every label file.
//!
//! The id of a class is its index in the list, so the list order is part of
//! the dataset format: reordering it changes every written label.

use clap::ValueEnum;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{ConvertError, Result};

/// The 28 image-level and local VinDr-CXR findings, in the order used by the PNG pipeline.
pub const VINDR_CXR_GLOBAL_28: &[&str] = &[
    "Aortic enlargement",
    "Atelectasis",
    "Cardiomegaly",
    "Calcification",
    "Clavicle fracture",
    "Consolidation",
    "Edema",
    "Emphysema",
    "Enlarged PA",
    "Interstitial lung disease(ILD)",
    "Infiltration",
    "Lung cavity",
    "Lung cyst",
    "Lung opacity",
    "Mediastinal shift",
    "Nodule/Mass",
    "Pulmonary fribosis",
    "Pneumothorax",
    "Pleural thickening",
    "Pleural effusion",
    "Rib fracture",
    "Other lesion",
    "Lung tumor",
    "Pneumonia",
    "Tuberculosis",
    "Other diseases",
    "COPD",
    "No finding",
];

/// The 22 local VinDr-CXR findings, spelled as in the box annotation files.
pub const VINDR_CXR_LOCAL_22: &[&str] = &[
    "Aortic enlargement",
    "Atelectasis",
    "Cardiomegaly",
    "Calcification",
    "Clavicle fracture",
    "Consolidation",
    "Edema",
    "Emphysema",
    "Enlarged PA",
    "ILD",
    "Infiltration",
    "Lung cavity",
    "Lung cyst",
    "Lung Opacity",
    "Mediastinal shift",
    "Nodule/Mass",
    "Pulmonary fibrosis",
    "Pneumothorax",
    "Pleural thickening",
    "Pleural effusion",
    "Rib fracture",
    "Other lesion",
];

/// Built-in, versioned class lists.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum ClassPreset {
    /// 28 classes including global labels and "No finding"
    Global28,
    /// 22 local lesion classes
    Local22,
}

impl ClassPreset {
    pub fn names(self) -> &'static [&'static str] {
        match self {
            ClassPreset::Global28 => VINDR_CXR_GLOBAL_28,
            ClassPreset::Local22 => VINDR_CXR_LOCAL_22,
        }
    }
}

/// Fixed, ordered list of class names with a derived name → id map.
#[derive(Debug, Clone)]
pub struct ClassRegistry {
    names: Vec<String>,
    ids: HashMap<String, usize>,
}

impl ClassRegistry {
    /// Build the registry from an ordered list. A repeated name resolves to
    /// the last index it appears at.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let ids = names
            .iter()
            .enumerate()
            .map(|(id, name)| (name.clone(), id))
            .collect();
        Self { names, ids }
    }

    pub fn from_preset(preset: ClassPreset) -> Self {
        Self::new(preset.names().iter().copied())
    }

    /// Read one class name per line. Blank lines and `#` comments are skipped.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConvertError::io(path, e))?;
        let registry = Self::new(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        );
        if registry.is_empty() {
            return Err(ConvertError::Config(format!(
                "class file {} lists no classes",
                path.display()
            )));
        }
        Ok(registry)
    }

    pub fn id(&self, name: &str) -> Option<usize> {
        self.ids.get(name).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names listed more than once, in first-seen order.
    pub fn duplicates(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        let mut duplicates = Vec::new();
        for name in &self.names {
            if !seen.insert(name.as_str()) && !duplicates.contains(&name.as_str()) {
                duplicates.push(name.as_str());
            }
        }
        duplicates
    }
}
