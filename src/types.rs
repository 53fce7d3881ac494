use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Extension of source DICOM files; the only candidate the resolver tries.
pub const DICOM_EXTENSION: &str = "dicom";

// PhysioNet download layout under the directory the user points at
const PHYSIONET_SUBDIR: &str = "physionet.org/files/vindr-cxr/1.0.0";

// One bounding-box row of an annotations CSV
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AnnotationRecord {
    pub image_id: String,
    pub class_name: String,
    pub x_min: Option<f64>,
    pub y_min: Option<f64>,
    pub x_max: Option<f64>,
    pub y_max: Option<f64>,
}

impl AnnotationRecord {
    /// Corner coordinates, if all four are present.
    pub fn corners(&self) -> Option<(f64, f64, f64, f64)> {
        Some((self.x_min?, self.y_min?, self.x_max?, self.y_max?))
    }
}

// One row of an image labels CSV; only the id is used
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ImageLabelRecord {
    pub image_id: String,
}

/// Pixel dimensions of a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageGeometry {
    pub width: u32,
    pub height: u32,
}

impl ImageGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A zero dimension marks an image that could not be resolved.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A study whose image artifact has been written to the output tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedImage {
    pub image_id: String,
    pub geometry: ImageGeometry,
    pub output_path: PathBuf,
}

/// A box in YOLO relative coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBox {
    pub class_id: usize,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl fmt::Display for NormalizedBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.6} {:.6} {:.6} {:.6}",
            self.class_id, self.x_center, self.y_center, self.width, self.height
        )
    }
}

/// Dataset partitions written to the output tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub fn dir_name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Split::Train => "Train",
            Split::Val => "Val",
            Split::Test => "Test",
        }
    }
}

// Struct to hold the paths to the output directories for train/val/test splits
#[derive(Debug, Clone)]
pub struct OutputDirs {
    pub root: PathBuf,
    pub train_images_dir: PathBuf,
    pub val_images_dir: PathBuf,
    pub test_images_dir: PathBuf,
    pub train_labels_dir: PathBuf,
    pub val_labels_dir: PathBuf,
    pub test_labels_dir: PathBuf,
}

impl OutputDirs {
    pub fn images_dir(&self, split: Split) -> &Path {
        match split {
            Split::Train => &self.train_images_dir,
            Split::Val => &self.val_images_dir,
            Split::Test => &self.test_images_dir,
        }
    }

    pub fn labels_dir(&self, split: Split) -> &Path {
        match split {
            Split::Train => &self.train_labels_dir,
            Split::Val => &self.val_labels_dir,
            Split::Test => &self.test_labels_dir,
        }
    }
}

/// Input files of one split.
#[derive(Debug, Clone)]
pub struct SplitInputs {
    pub annotations_csv: PathBuf,
    pub image_labels_csv: PathBuf,
    pub dicom_dir: PathBuf,
}

/// Locations of the input tables and DICOM folders.
#[derive(Debug, Clone)]
pub struct DatasetPaths {
    pub train: SplitInputs,
    pub test: SplitInputs,
}

impl DatasetPaths {
    /// Accept either the dataset folder itself (holding `annotations/`) or the
    /// directory the PhysioNet download was placed in.
    pub fn from_root(root: &Path) -> Self {
        let base = if root.join("annotations").is_dir() {
            root.to_path_buf()
        } else {
            root.join(PHYSIONET_SUBDIR)
        };
        let annotations = base.join("annotations");
        Self {
            train: SplitInputs {
                annotations_csv: annotations.join("annotations_train.csv"),
                image_labels_csv: annotations.join("image_labels_train.csv"),
                dicom_dir: base.join("train"),
            },
            test: SplitInputs {
                annotations_csv: annotations.join("annotations_test.csv"),
                image_labels_csv: annotations.join("image_labels_test.csv"),
                dicom_dir: base.join("test"),
            },
        }
    }
}

// Struct to hold processing statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessingStats {
    pub total_images: usize,
    pub successful_conversions: usize,
    pub skipped_missing_image: usize,
    pub failed_conversions: usize,
    pub skipped_name_clash: usize,
    pub boxes_written: usize,
    pub dropped_unknown_class: usize,
    pub dropped_missing_geometry: usize,
    pub invalid_boxes: usize,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: &ProcessingStats) {
        self.total_images += other.total_images;
        self.successful_conversions += other.successful_conversions;
        self.skipped_missing_image += other.skipped_missing_image;
        self.failed_conversions += other.failed_conversions;
        self.skipped_name_clash += other.skipped_name_clash;
        self.boxes_written += other.boxes_written;
        self.dropped_unknown_class += other.dropped_unknown_class;
        self.dropped_missing_geometry += other.dropped_missing_geometry;
        self.invalid_boxes += other.invalid_boxes;
    }

    pub fn print_summary(&self, split_name: &str) {
        log::info!("=== {} Summary ===", split_name);
        log::info!("Images listed: {}", self.total_images);
        log::info!("Images converted: {}", self.successful_conversions);
        log::info!("Boxes written: {}", self.boxes_written);

        let skipped =
            self.skipped_missing_image + self.failed_conversions + self.skipped_name_clash;
        if skipped > 0 {
            log::warn!(
                "Skipped images: {} (missing dicom file: {}, unreadable: {}, file name clash: {})",
                skipped,
                self.skipped_missing_image,
                self.failed_conversions,
                self.skipped_name_clash
            );
        }
        if self.dropped_unknown_class > 0 {
            log::warn!(
                "Dropped {} annotation rows whose class is not in the class list",
                self.dropped_unknown_class
            );
        }
        if self.dropped_missing_geometry > 0 {
            log::info!(
                "Dropped {} annotation rows without coordinates",
                self.dropped_missing_geometry
            );
        }
        if self.invalid_boxes > 0 {
            log::warn!(
                "Found {} boxes outside the image or with inverted corners",
                self.invalid_boxes
            );
        }
    }
}

/// Result of processing one input split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSummary {
    pub split: Split,
    pub processed: usize,
    pub stats: ProcessingStats,
}

/// Image counts after moving part of train into val.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitCounts {
    pub train: usize,
    pub val: usize,
}
