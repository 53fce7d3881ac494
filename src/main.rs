use clap::Parser;
use log::{error, info};
use std::process::ExitCode;

use dicom2yolo::{
    materializer_for, process_dataset, Args, AssemblerOptions, ClassRegistry, ProcessingStats,
    Result,
};

fn run(args: &Args) -> Result<()> {
    let (dataset_dir, output_dir) = args.resolve_paths()?;

    let registry = match &args.class_file {
        Some(path) => ClassRegistry::from_file(path)?,
        None => ClassRegistry::from_preset(args.effective_preset()),
    };
    let materializer = materializer_for(args.format);
    let options = AssemblerOptions {
        val_size: args.val_size,
        seed: args.seed,
        box_policy: args.box_policy,
        workers: args.workers,
    };

    info!(
        "Starting the conversion of {} into {}...",
        dataset_dir.display(),
        output_dir.display()
    );
    let report = process_dataset(
        &dataset_dir,
        &output_dir,
        &registry,
        materializer.as_ref(),
        options,
    )?;

    let mut total = ProcessingStats::new();
    total.merge(&report.train.stats);
    total.merge(&report.test.stats);
    total.print_summary("Overall");
    info!(
        "train: {}, val: {}, test: {} images; manifest at {}",
        report.split_counts.train,
        report.split_counts.val,
        report.test.processed,
        report.manifest_path.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Conversion failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
