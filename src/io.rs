use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::classes::ClassRegistry;
use crate::error::{ConvertError, Result};
use crate::types::{OutputDirs, Split};
use crate::utils::create_output_directory;

/// Name of the manifest read by the training tool.
pub const MANIFEST_FILE: &str = "data.yaml";

// Radiographs are single channel
const CHANNELS: u32 = 1;

/// Set up the `images/{train,val,test}` and `labels/{train,val,test}` tree
pub fn setup_output_directories(output_root: &Path) -> Result<OutputDirs> {
    fs::create_dir_all(output_root).map_err(|e| ConvertError::io(output_root, e))?;
    let images_dir = create_output_directory(&output_root.join("images"))?;
    let labels_dir = create_output_directory(&output_root.join("labels"))?;

    let make = |parent: &Path, split: Split| create_output_directory(&parent.join(split.dir_name()));

    Ok(OutputDirs {
        root: output_root.to_path_buf(),
        train_images_dir: make(&images_dir, Split::Train)?,
        val_images_dir: make(&images_dir, Split::Val)?,
        test_images_dir: make(&images_dir, Split::Test)?,
        train_labels_dir: make(&labels_dir, Split::Train)?,
        val_labels_dir: make(&labels_dir, Split::Val)?,
        test_labels_dir: make(&labels_dir, Split::Test)?,
    })
}

/// Create the data.yaml file for YOLO training
pub fn create_dataset_yaml(output_root: &Path, registry: &ClassRegistry) -> Result<PathBuf> {
    let dataset_yaml_path = output_root.join(MANIFEST_FILE);
    let absolute_path =
        fs::canonicalize(output_root).map_err(|e| ConvertError::io(output_root, e))?;

    let mut yaml_content = format!(
        "path: {}\ntrain: images/{}\nval: images/{}\ntest: images/{}\nchannels: {}\n",
        yaml_scalar(&absolute_path.to_string_lossy()),
        Split::Train.dir_name(),
        Split::Val.dir_name(),
        Split::Test.dir_name(),
        CHANNELS,
    );
    yaml_content.push_str(&format!("\nnc: {}\nnames:\n", registry.len()));
    for (id, name) in registry.names().iter().enumerate() {
        yaml_content.push_str(&format!("    {}: {}\n", id, yaml_scalar(name)));
    }

    let mut dataset_yaml = BufWriter::new(
        File::create(&dataset_yaml_path).map_err(|e| ConvertError::io(&dataset_yaml_path, e))?,
    );
    dataset_yaml
        .write_all(yaml_content.as_bytes())
        .and_then(|_| dataset_yaml.flush())
        .map_err(|e| ConvertError::io(&dataset_yaml_path, e))?;
    Ok(dataset_yaml_path)
}

// Quote values a YAML parser would not read back as the same plain string
fn yaml_scalar(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value != value.trim()
        || value.contains(": ")
        || value.contains(" #")
        || value.ends_with(':')
        || value.starts_with(|c: char| "-?:,[]{}#&*!|>'\"%@`".contains(c))
        || matches!(
            value.to_ascii_lowercase().as_str(),
            "true" | "false" | "yes" | "no" | "on" | "off" | "null" | "~"
        );
    if needs_quotes {
        format!("'{}'", value.replace('\'', "''"))
    } else {
        value.to_string()
    }
}
