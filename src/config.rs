use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;

use crate::classes::ClassPreset;
use crate::error::{ConvertError, Result};

/// Command-line arguments for converting a VinDr-CXR style DICOM dataset to YOLO format.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    /// Root of the downloaded dataset (prompted for when omitted)
    #[arg(short = 'd', long = "dataset_dir")]
    pub dataset_dir: Option<PathBuf>,

    /// Output directory, created if missing (prompted for when omitted)
    #[arg(short = 'o', long = "output_dir")]
    pub output_dir: Option<PathBuf>,

    /// How source images are written to the output tree: 'png' or 'dicom'
    #[arg(long = "format", value_enum, default_value = "png")]
    pub format: ImageFormat,

    /// Built-in class list; defaults to global28 for png and local22 for dicom
    #[arg(long = "classes", value_enum)]
    pub classes: Option<ClassPreset>,

    /// File with one class name per line, overriding --classes
    #[arg(long = "class_file")]
    pub class_file: Option<PathBuf>,

    /// Proportion of the train split moved to validation
    #[arg(long = "val_size", default_value_t = 0.2, value_parser = validate_size)]
    pub val_size: f64,

    /// Seed for the train/val shuffle
    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,

    /// What to do with boxes outside the image or with inverted corners
    #[arg(long = "box_policy", value_enum, default_value = "pass-through")]
    pub box_policy: BoxPolicy,

    /// Number of worker threads used to resolve images
    #[arg(long = "workers", default_value_t = num_cpus::get())]
    pub workers: usize,
}

impl Args {
    /// The class preset in effect when no class file is given.
    pub fn effective_preset(&self) -> ClassPreset {
        self.classes.unwrap_or(match self.format {
            ImageFormat::Png => ClassPreset::Global28,
            ImageFormat::Dicom => ClassPreset::Local22,
        })
    }

    /// Fill in missing paths by asking on the terminal.
    pub fn resolve_paths(&self) -> Result<(PathBuf, PathBuf)> {
        let dataset_dir = match &self.dataset_dir {
            Some(dir) => dir.clone(),
            None => prompt_path("Path of the directory holding the PhysioNet download:")?,
        };
        let output_dir = match &self.output_dir {
            Some(dir) => dir.clone(),
            None => prompt_path("Name of the output directory (created if missing):")?,
        };
        Ok((dataset_dir, output_dir))
    }
}

/// Output image artifact written for each resolved study.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum ImageFormat {
    /// Decode pixel data and write an 8-bit grayscale PNG
    Png,
    /// Copy the original DICOM file unchanged
    Dicom,
}

/// Handling of boxes that fall outside the image or have inverted corners.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default)]
pub enum BoxPolicy {
    /// Write the box as computed, even when out of range
    #[default]
    PassThrough,
    /// Clamp each normalized value to [0, 1]
    Clamp,
    /// Drop the box
    Reject,
}

// Validate that the size is between 0.0 and 1.0
fn validate_size(s: &str) -> std::result::Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("SIZE must be between 0.0 and 1.0".to_string()),
    }
}

fn prompt_path(message: &str) -> Result<PathBuf> {
    let answer = inquire::Text::new(message)
        .prompt()
        .map_err(|e| ConvertError::Prompt(e.to_string()))?;
    let trimmed = answer.trim();
    if trimmed.is_empty() {
        return Err(ConvertError::Config(format!("no answer given for '{message}'")));
    }
    Ok(PathBuf::from(trimmed))
}
