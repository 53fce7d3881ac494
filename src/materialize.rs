//! Strategies for placing a source study into the output image folder.

use std::fs;
use std::path::Path;

use crate::config::ImageFormat;
use crate::dicom::{decode_raster, read_geometry};
use crate::error::{ConvertError, Result};
use crate::types::{ImageGeometry, DICOM_EXTENSION};

/// Writes the image artifact for one study and reports its pixel geometry.
pub trait ImageMaterializer: Sync {
    /// Extension of the files written to the images folder.
    fn extension(&self) -> &'static str;

    /// Materialize `source` at `destination` (which already carries
    /// [`Self::extension`]).
    fn materialize(&self, source: &Path, destination: &Path) -> Result<ImageGeometry>;
}

/// Decodes pixel data and writes an 8-bit grayscale PNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RasterPng;

impl ImageMaterializer for RasterPng {
    fn extension(&self) -> &'static str {
        "png"
    }

    fn materialize(&self, source: &Path, destination: &Path) -> Result<ImageGeometry> {
        let raster = decode_raster(source)?;
        let ImageGeometry { width, height } = raster.geometry;
        let image = image::GrayImage::from_raw(width, height, raster.pixels).ok_or_else(|| {
            ConvertError::dicom(source, "decoded pixel count does not match Rows x Columns")
        })?;
        image.save(destination).map_err(|e| ConvertError::Image {
            path: destination.to_path_buf(),
            source: e,
        })?;
        Ok(raster.geometry)
    }
}

/// Copies the source DICOM unchanged, reading only its declared geometry.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughDicom;

impl ImageMaterializer for PassThroughDicom {
    fn extension(&self) -> &'static str {
        DICOM_EXTENSION
    }

    fn materialize(&self, source: &Path, destination: &Path) -> Result<ImageGeometry> {
        let geometry = read_geometry(source)?;
        if geometry.is_empty() {
            return Ok(geometry);
        }
        fs::copy(source, destination).map_err(|e| ConvertError::io(destination, e))?;
        Ok(geometry)
    }
}

/// The materializer selected on the command line.
pub fn materializer_for(format: ImageFormat) -> Box<dyn ImageMaterializer> {
    match format {
        ImageFormat::Png => Box::new(RasterPng),
        ImageFormat::Dicom => Box::new(PassThroughDicom),
    }
}
