//! DICOM to YOLO dataset converter
//!
//! This library converts VinDr-CXR style chest radiographs (DICOM files plus CSV
//! bounding-box annotations) into the directory layout and label format used
//! for YOLO object-detection training.

pub mod annotations;
pub mod classes;
pub mod config;
pub mod conversion;
pub mod dataset;
pub mod dicom;
pub mod error;
pub mod io;
pub mod materialize;
pub mod raster;
pub mod types;
pub mod utils;
pub mod yolo_dataset;

// Re-export commonly used types and functions
pub use classes::{ClassPreset, ClassRegistry};
pub use config::{Args, BoxPolicy, ImageFormat};
pub use conversion::{convert_to_yolo_format, normalize_bbox};
pub use error::{ConvertError, Result};
pub use io::{create_dataset_yaml, setup_output_directories};
pub use materialize::{materializer_for, ImageMaterializer, PassThroughDicom, RasterPng};
pub use types::{AnnotationRecord, DatasetPaths, ImageGeometry, OutputDirs, ProcessingStats, Split};
pub use yolo_dataset::{process_dataset, AssemblerOptions, DatasetAssembler, DatasetReport};
