//! Dataset assembly: train and test conversion, the val split, and the manifest.

use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::annotations::{distinct_image_ids, load_image_labels, AnnotationIndex};
use crate::classes::ClassRegistry;
use crate::config::BoxPolicy;
use crate::conversion::{convert_to_yolo_format, write_label_file, LabelStats};
use crate::dataset::split_train_val;
use crate::dicom::find_dicom;
use crate::error::{ConvertError, Result};
use crate::io::{create_dataset_yaml, setup_output_directories};
use crate::materialize::ImageMaterializer;
use crate::types::{
    DatasetPaths, OutputDirs, ProcessingStats, ResolvedImage, Split, SplitCounts, SplitInputs,
    SplitSummary,
};
use crate::utils::{create_progress_bar, create_worker_pool, file_stem_for};

/// Steps of a conversion run, in the only order they happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AssemblerState {
    Init,
    FoldersCreated,
    TrainProcessed,
    TestProcessed,
    ValSplit,
    ManifestWritten,
    Done,
}

/// Settings shared by every split of a run.
#[derive(Debug, Clone)]
pub struct AssemblerOptions {
    pub val_size: f64,
    pub seed: u64,
    pub box_policy: BoxPolicy,
    pub workers: usize,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            val_size: 0.2,
            seed: 42,
            box_policy: BoxPolicy::PassThrough,
            workers: 1,
        }
    }
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct DatasetReport {
    pub train: SplitSummary,
    pub test: SplitSummary,
    pub split_counts: SplitCounts,
    pub manifest_path: PathBuf,
}

// Outcome of one image id, merged in id order after the parallel pass
enum ImageOutcome {
    Converted(ResolvedImage, LabelStats),
    Missing,
    Failed,
    NameClash,
}

/// Converts the train and test splits into a YOLO dataset.
pub struct DatasetAssembler<'a> {
    inputs: DatasetPaths,
    output_root: PathBuf,
    registry: &'a ClassRegistry,
    materializer: &'a dyn ImageMaterializer,
    options: AssemblerOptions,
    state: AssemblerState,
}

impl<'a> DatasetAssembler<'a> {
    pub fn new(
        inputs: DatasetPaths,
        output_root: impl Into<PathBuf>,
        registry: &'a ClassRegistry,
        materializer: &'a dyn ImageMaterializer,
        options: AssemblerOptions,
    ) -> Self {
        Self {
            inputs,
            output_root: output_root.into(),
            registry,
            materializer,
            options,
            state: AssemblerState::Init,
        }
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    fn advance(&mut self, next: AssemblerState) {
        debug!("Assembler state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run every step. A dataset-level error stops the run where it happened.
    pub fn run(&mut self) -> Result<DatasetReport> {
        if self.state != AssemblerState::Init {
            return Err(ConvertError::Config(format!(
                "assembler already ran (state {:?})",
                self.state
            )));
        }

        info!("Classes: {:?}", self.registry.names());
        for name in self.registry.duplicates() {
            warn!("Class {:?} is listed more than once; it maps to its last position", name);
        }

        let output_dirs = setup_output_directories(&self.output_root)?;
        self.advance(AssemblerState::FoldersCreated);

        let pool = create_worker_pool(self.options.workers)?;

        let train_inputs = self.inputs.train.clone();
        let train = pool.install(|| self.process_split(Split::Train, &train_inputs, &output_dirs))?;
        self.advance(AssemblerState::TrainProcessed);

        let test_inputs = self.inputs.test.clone();
        let test = pool.install(|| self.process_split(Split::Test, &test_inputs, &output_dirs))?;
        self.advance(AssemblerState::TestProcessed);

        let split_counts = split_train_val(
            &output_dirs,
            self.options.val_size,
            self.options.seed,
            self.materializer.extension(),
        )?;
        self.advance(AssemblerState::ValSplit);

        info!("Creating data.yaml file...");
        let manifest_path = create_dataset_yaml(&output_dirs.root, self.registry)?;
        self.advance(AssemblerState::ManifestWritten);

        info!("Conversion process completed successfully.");
        self.advance(AssemblerState::Done);

        Ok(DatasetReport {
            train,
            test,
            split_counts,
            manifest_path,
        })
    }

    /// Convert every image listed for one input split.
    pub fn process_split(
        &self,
        split: Split,
        inputs: &SplitInputs,
        output_dirs: &OutputDirs,
    ) -> Result<SplitSummary> {
        info!("Processing {} split...", split.dir_name());

        let index = AnnotationIndex::load(&inputs.annotations_csv)?;
        let image_ids = distinct_image_ids(&load_image_labels(&inputs.image_labels_csv)?);
        info!(
            "{}: {} images listed, {} annotation rows for {} images.",
            split.display_name(),
            image_ids.len(),
            index.record_count(),
            index.image_count()
        );

        let stems = assign_stems(&image_ids);

        let pb = create_progress_bar(image_ids.len() as u64, split.display_name());
        let outcomes: Vec<ImageOutcome> = image_ids
            .par_iter()
            .zip(stems.par_iter())
            .map(|(image_id, stem)| {
                let outcome = match stem {
                    Some(stem) => self.process_image(
                        image_id,
                        stem,
                        &index,
                        &inputs.dicom_dir,
                        output_dirs.images_dir(split),
                        output_dirs.labels_dir(split),
                    ),
                    None => ImageOutcome::NameClash,
                };
                pb.inc(1);
                outcome
            })
            .collect();
        pb.finish_with_message(format!("{} processing complete", split.display_name()));

        let mut stats = ProcessingStats::new();
        stats.total_images = image_ids.len();
        for outcome in &outcomes {
            match outcome {
                ImageOutcome::Converted(resolved, label_stats) => {
                    debug!(
                        "{} -> {} ({}x{})",
                        resolved.image_id,
                        resolved.output_path.display(),
                        resolved.geometry.width,
                        resolved.geometry.height
                    );
                    stats.successful_conversions += 1;
                    stats.boxes_written += label_stats.written;
                    stats.dropped_unknown_class += label_stats.dropped_unknown_class;
                    stats.dropped_missing_geometry += label_stats.dropped_missing_geometry;
                    stats.invalid_boxes += label_stats.invalid;
                }
                ImageOutcome::Missing => stats.skipped_missing_image += 1,
                ImageOutcome::Failed => stats.failed_conversions += 1,
                ImageOutcome::NameClash => stats.skipped_name_clash += 1,
            }
        }
        stats.print_summary(split.display_name());

        Ok(SplitSummary {
            split,
            processed: stats.successful_conversions,
            stats,
        })
    }

    fn process_image(
        &self,
        image_id: &str,
        stem: &str,
        index: &AnnotationIndex,
        dicom_dir: &Path,
        images_dir: &Path,
        labels_dir: &Path,
    ) -> ImageOutcome {
        let Some(source) = find_dicom(image_id, dicom_dir) else {
            let missing = ConvertError::MissingImage {
                image_id: image_id.to_string(),
            };
            warn!("{}", missing);
            return ImageOutcome::Missing;
        };

        match self.convert_image(image_id, stem, &source, index, images_dir, labels_dir) {
            Ok(Some(converted)) => converted,
            Ok(None) => ImageOutcome::Failed,
            Err(e) => {
                error!("Failed to convert {}: {}", image_id, e);
                ImageOutcome::Failed
            }
        }
    }

    fn convert_image(
        &self,
        image_id: &str,
        stem: &str,
        source: &Path,
        index: &AnnotationIndex,
        images_dir: &Path,
        labels_dir: &Path,
    ) -> Result<Option<ImageOutcome>> {
        let image_path = images_dir.join(format!("{}.{}", stem, self.materializer.extension()));

        let geometry = match self.materializer.materialize(source, &image_path) {
            Ok(geometry) => geometry,
            Err(e) => {
                discard_image(&image_path);
                return Err(e);
            }
        };
        if geometry.is_empty() {
            error!(
                "Image {} reports zero size {}x{}; skipping",
                image_id, geometry.width, geometry.height
            );
            discard_image(&image_path);
            return Ok(None);
        }

        let label = convert_to_yolo_format(
            index.get(image_id),
            self.registry,
            geometry,
            self.options.box_policy,
        );
        let label_path = labels_dir.join(format!("{stem}.txt"));
        if let Err(e) = write_label_file(&label_path, &label) {
            // No image without its label
            discard_image(&image_path);
            return Err(e);
        }

        Ok(Some(ImageOutcome::Converted(
            ResolvedImage {
                image_id: image_id.to_string(),
                geometry,
                output_path: image_path,
            },
            label.stats,
        )))
    }
}

/// Output file stem per image id; `None` for an id whose sanitized stem was
/// already taken by an earlier id in the list.
fn assign_stems(image_ids: &[String]) -> Vec<Option<String>> {
    let mut owners: HashMap<String, &str> = HashMap::with_capacity(image_ids.len());
    image_ids
        .iter()
        .map(|image_id| {
            let stem = file_stem_for(image_id);
            if let Some(owner) = owners.get(&stem) {
                warn!(
                    "Image {:?} maps to file name {:?} already used by {:?}; skipping",
                    image_id, stem, owner
                );
                return None;
            }
            owners.insert(stem.clone(), image_id);
            Some(stem)
        })
        .collect()
}

// Remove a partially written image so no image is left without a label
fn discard_image(image_path: &Path) {
    if image_path.exists() {
        if let Err(e) = fs::remove_file(image_path) {
            warn!(
                "Failed to remove orphaned image {}: {}",
                image_path.display(),
                e
            );
        }
    }
}

/// Convert the dataset under `dataset_dir` into a YOLO tree at `output_dir`.
pub fn process_dataset(
    dataset_dir: &Path,
    output_dir: &Path,
    registry: &ClassRegistry,
    materializer: &dyn ImageMaterializer,
    options: AssemblerOptions,
) -> Result<DatasetReport> {
    let inputs = DatasetPaths::from_root(dataset_dir);
    let mut assembler = DatasetAssembler::new(inputs, output_dir, registry, materializer, options);
    assembler.run()
}
