use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConvertError>;

/// Errors raised while converting a DICOM dataset.
///
/// Dataset-level variants (`Csv`, `Io` on the output tree, `Config`) abort the
/// run. Image-level variants are logged and counted by the assembler.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("dicom error at {path}: {message}")]
    Dicom { path: PathBuf, message: String },
    #[error("image encode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("dicom file not found for image {image_id}")]
    MissingImage { image_id: String },
    #[error("invalid annotation for image {image_id}: {reason}")]
    InvalidAnnotation { image_id: String, reason: String },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("prompt failed: {0}")]
    Prompt(String),
}

impl ConvertError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        ConvertError::Csv {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn dicom(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        ConvertError::Dicom {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
