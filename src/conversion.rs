use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::classes::ClassRegistry;
use crate::config::BoxPolicy;
use crate::error::{ConvertError, Result};
use crate::types::{AnnotationRecord, ImageGeometry, NormalizedBox};

/// Convert pixel corners to YOLO center/extent fractions.
///
/// No clamping or validation happens here; a zero dimension yields
/// non-finite values.
pub fn normalize_bbox(
    x_min: f64,
    y_min: f64,
    x_max: f64,
    y_max: f64,
    img_w: f64,
    img_h: f64,
) -> (f64, f64, f64, f64) {
    let x_center = (x_min + x_max) / 2.0 / img_w;
    let y_center = (y_min + y_max) / 2.0 / img_h;
    let width = (x_max - x_min) / img_w;
    let height = (y_max - y_min) / img_h;
    (x_center, y_center, width, height)
}

/// Check that a row's corners are ordered and lie inside the image.
pub fn validate_bbox(record: &AnnotationRecord, geometry: ImageGeometry) -> Result<()> {
    let invalid = |reason: String| ConvertError::InvalidAnnotation {
        image_id: record.image_id.clone(),
        reason,
    };

    let (x_min, y_min, x_max, y_max) = record
        .corners()
        .ok_or_else(|| invalid("missing coordinates".to_string()))?;

    if geometry.is_empty() {
        return Err(invalid(format!(
            "image has zero size {}x{}",
            geometry.width, geometry.height
        )));
    }
    if x_max < x_min || y_max < y_min {
        return Err(invalid(format!(
            "inverted corners ({x_min}, {y_min}) - ({x_max}, {y_max})"
        )));
    }

    let (w, h) = (geometry.width as f64, geometry.height as f64);
    let inside = |v: f64, limit: f64| (0.0..=limit).contains(&v);
    if !(inside(x_min, w) && inside(x_max, w) && inside(y_min, h) && inside(y_max, h)) {
        return Err(invalid(format!(
            "box ({x_min}, {y_min}) - ({x_max}, {y_max}) outside {}x{} image",
            geometry.width, geometry.height
        )));
    }
    Ok(())
}

/// Tally of what happened to the rows of one image.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LabelStats {
    pub written: usize,
    pub dropped_unknown_class: usize,
    pub dropped_missing_geometry: usize,
    pub invalid: usize,
}

/// The label file body for one image and how its rows were handled.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LabelOutput {
    pub boxes: Vec<NormalizedBox>,
    pub stats: LabelStats,
}

impl LabelOutput {
    /// Newline-terminated YOLO lines.
    pub fn to_text(&self) -> String {
        let mut text = String::with_capacity(self.boxes.len() * 48);
        for b in &self.boxes {
            text.push_str(&b.to_string());
            text.push('\n');
        }
        text
    }
}

/// Convert the annotation rows of one image to YOLO boxes.
pub fn convert_to_yolo_format(
    records: &[AnnotationRecord],
    registry: &ClassRegistry,
    geometry: ImageGeometry,
    policy: BoxPolicy,
) -> LabelOutput {
    let mut output = LabelOutput::default();

    for record in records {
        let class_id = match registry.id(&record.class_name) {
            Some(class_id) => class_id,
            None => {
                output.stats.dropped_unknown_class += 1;
                continue;
            }
        };

        let Some((x_min, y_min, x_max, y_max)) = record.corners() else {
            output.stats.dropped_missing_geometry += 1;
            continue;
        };

        if let Err(e) = validate_bbox(record, geometry) {
            output.stats.invalid += 1;
            log::debug!("{}", e);
            if policy == BoxPolicy::Reject {
                continue;
            }
        }

        let (mut x_center, mut y_center, mut width, mut height) = normalize_bbox(
            x_min,
            y_min,
            x_max,
            y_max,
            geometry.width as f64,
            geometry.height as f64,
        );
        if policy == BoxPolicy::Clamp {
            x_center = x_center.clamp(0.0, 1.0);
            y_center = y_center.clamp(0.0, 1.0);
            width = width.clamp(0.0, 1.0);
            height = height.clamp(0.0, 1.0);
        }

        output.boxes.push(NormalizedBox {
            class_id,
            x_center,
            y_center,
            width,
            height,
        });
        output.stats.written += 1;
    }

    output
}

/// Write a label file; an image without boxes still gets an empty file.
pub fn write_label_file(path: &Path, output: &LabelOutput) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path).map_err(|e| ConvertError::io(path, e))?);
    writer
        .write_all(output.to_text().as_bytes())
        .and_then(|_| writer.flush())
        .map_err(|e| ConvertError::io(path, e))
}
