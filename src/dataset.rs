use glob::glob;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConvertError, Result};
use crate::types::{OutputDirs, Split, SplitCounts};

/// Number of images moved to validation: `floor(total * ratio)`.
pub fn val_count(total: usize, ratio: f64) -> usize {
    (total as f64 * ratio).floor() as usize
}

/// Pick the images that move to validation.
///
/// The listing is sorted before the seeded shuffle so the choice does not
/// depend on filesystem order.
pub fn select_val_images(mut images: Vec<PathBuf>, ratio: f64, seed: u64) -> Vec<PathBuf> {
    images.sort();
    let mut rng = StdRng::seed_from_u64(seed);
    images.shuffle(&mut rng);
    let n_val = val_count(images.len(), ratio);
    images.truncate(n_val);
    images
}

fn list_images(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let pattern = format!(
        "{}/*.{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        extension
    );
    let entries = glob(&pattern).map_err(|e| ConvertError::Config(format!("bad glob {pattern}: {e}")))?;
    Ok(entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Failed to list {}: {}", e.path().display(), e);
                None
            }
        })
        .filter(|path| path.is_file())
        .collect())
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_err() {
        fs::copy(from, to).map_err(|e| ConvertError::io(to, e))?;
        fs::remove_file(from).map_err(|e| ConvertError::io(from, e))?;
    }
    Ok(())
}

/// Move part of the train split, images and labels alike, into val.
pub fn split_train_val(
    output_dirs: &OutputDirs,
    ratio: f64,
    seed: u64,
    extension: &str,
) -> Result<SplitCounts> {
    let train_images_dir = output_dirs.images_dir(Split::Train);
    let train_labels_dir = output_dirs.labels_dir(Split::Train);
    let val_images_dir = output_dirs.images_dir(Split::Val);
    let val_labels_dir = output_dirs.labels_dir(Split::Val);

    let images = list_images(train_images_dir, extension)?;
    let total = images.len();
    let val_images = select_val_images(images, ratio, seed);

    for image in &val_images {
        let Some(file_name) = image.file_name() else {
            continue;
        };
        move_file(image, &val_images_dir.join(file_name))?;

        let label_name = Path::new(file_name).with_extension("txt");
        let src_label = train_labels_dir.join(&label_name);
        if src_label.exists() {
            move_file(&src_label, &val_labels_dir.join(&label_name))?;
        }
    }

    let counts = SplitCounts {
        train: total - val_images.len(),
        val: val_images.len(),
    };
    info!(
        "Split train into {} train and {} val images.",
        counts.train, counts.val
    );
    Ok(counts)
}
