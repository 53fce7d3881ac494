//! Locating source DICOM files and extracting their geometry or pixels.

use dicom_dictionary_std::tags;
use dicom_object::{DefaultDicomObject, OpenFileOptions};
use dicom_pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder};
use std::path::{Path, PathBuf};

use crate::error::{ConvertError, Result};
use crate::raster::{to_display_u8, Rescale};
use crate::types::{ImageGeometry, DICOM_EXTENSION};

/// An 8-bit grayscale raster ready to be encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct GrayRaster {
    pub geometry: ImageGeometry,
    pub pixels: Vec<u8>,
}

/// Path of `<image_id>.dicom` inside `folder`, if it exists.
pub fn find_dicom(image_id: &str, folder: &Path) -> Option<PathBuf> {
    let path = folder.join(format!("{image_id}.{DICOM_EXTENSION}"));
    path.is_file().then_some(path)
}

/// Read the declared Columns/Rows without touching pixel data.
pub fn read_geometry(path: &Path) -> Result<ImageGeometry> {
    let obj = OpenFileOptions::new()
        .read_until(tags::PIXEL_DATA)
        .open_file(path)
        .map_err(|e| ConvertError::dicom(path, e))?;
    geometry_of(&obj, path)
}

fn geometry_of(obj: &DefaultDicomObject, path: &Path) -> Result<ImageGeometry> {
    let width = obj
        .element(tags::COLUMNS)
        .map_err(|e| ConvertError::dicom(path, e))?
        .to_int::<u32>()
        .map_err(|e| ConvertError::dicom(path, e))?;
    let height = obj
        .element(tags::ROWS)
        .map_err(|e| ConvertError::dicom(path, e))?
        .to_int::<u32>()
        .map_err(|e| ConvertError::dicom(path, e))?;
    Ok(ImageGeometry::new(width, height))
}

/// Decode the first frame and map it to an 8-bit display raster.
pub fn decode_raster(path: &Path) -> Result<GrayRaster> {
    let obj = OpenFileOptions::new()
        .open_file(path)
        .map_err(|e| ConvertError::dicom(path, e))?;

    let invert = is_monochrome1(&obj);
    let rescale = rescale_of(&obj);

    let decoded = obj
        .decode_pixel_data()
        .map_err(|e| ConvertError::dicom(path, e))?;
    if decoded.samples_per_pixel() != 1 {
        return Err(ConvertError::dicom(
            path,
            format!(
                "expected a single-sample image, found {} samples per pixel",
                decoded.samples_per_pixel()
            ),
        ));
    }
    let geometry = ImageGeometry::new(decoded.columns(), decoded.rows());

    // Stored values only; inversion and rescale are applied below in a fixed order
    let options = ConvertOptions::new().with_modality_lut(ModalityLutOption::None);
    let values: Vec<f64> = decoded
        .to_vec_frame_with_options(0, &options)
        .map_err(|e| ConvertError::dicom(path, e))?;

    Ok(GrayRaster {
        geometry,
        pixels: to_display_u8(values, invert, rescale),
    })
}

fn is_monochrome1(obj: &DefaultDicomObject) -> bool {
    obj.element_opt(tags::PHOTOMETRIC_INTERPRETATION)
        .ok()
        .flatten()
        .and_then(|elem| elem.to_str().ok())
        .is_some_and(|value| value.trim() == "MONOCHROME1")
}

fn rescale_of(obj: &DefaultDicomObject) -> Option<Rescale> {
    let read = |tag| {
        obj.element_opt(tag)
            .ok()
            .flatten()
            .and_then(|elem| elem.to_float64().ok())
    };
    Some(Rescale {
        slope: read(tags::RESCALE_SLOPE)?,
        intercept: read(tags::RESCALE_INTERCEPT)?,
    })
}
