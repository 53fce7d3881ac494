use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use dicom2yolo::{
    AssemblerOptions, BoxPolicy, ClassRegistry, ConvertError, DatasetAssembler, DatasetPaths,
    ImageGeometry, ImageMaterializer, Result,
};

/// Source files hold "<width> <height>"; the copy keeps that text.
struct FakeMaterializer;

impl ImageMaterializer for FakeMaterializer {
    fn extension(&self) -> &'static str {
        "img"
    }

    fn materialize(&self, source: &Path, destination: &Path) -> Result<ImageGeometry> {
        let text = fs::read_to_string(source).map_err(|e| ConvertError::Io {
            path: source.to_path_buf(),
            source: e,
        })?;
        let mut dims = text.split_whitespace().map(|v| v.parse::<u32>().unwrap_or(0));
        let geometry = ImageGeometry::new(dims.next().unwrap_or(0), dims.next().unwrap_or(0));
        fs::copy(source, destination).map_err(|e| ConvertError::Io {
            path: destination.to_path_buf(),
            source: e,
        })?;
        Ok(geometry)
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    input: PathBuf,
    output: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("vindr");
    let annotations = input.join("annotations");
    fs::create_dir_all(&annotations).unwrap();
    fs::create_dir_all(input.join("train")).unwrap();
    fs::create_dir_all(input.join("test")).unwrap();

    let mut image_labels = String::from("image_id,rad_id,Cardiomegaly\n");
    for i in 1..=10 {
        image_labels.push_str(&format!("img{i},R1,0\n"));
        fs::write(input.join("train").join(format!("img{i}.dicom")), "100 100").unwrap();
    }
    // second radiologist row and a study whose file is missing
    image_labels.push_str("img1,R2,0\nghost,R1,0\n");
    fs::write(annotations.join("image_labels_train.csv"), image_labels).unwrap();

    fs::write(
        annotations.join("annotations_train.csv"),
        "\
image_id,rad_id,class_name,x_min,y_min,x_max,y_max
img1,R1,A,10,10,30,30
img1,R2,Unknown,10,10,30,30
img2,R1,B,0,0,50,100
img3,R1,B,,,,
ghost,R1,A,1,1,2,2
",
    )
    .unwrap();

    fs::write(
        annotations.join("image_labels_test.csv"),
        "image_id\nt1\nt2\nt3\n",
    )
    .unwrap();
    fs::write(
        annotations.join("annotations_test.csv"),
        "image_id,class_name,x_min,y_min,x_max,y_max\nt1,A,190,90,210,110\n",
    )
    .unwrap();
    fs::write(input.join("test/t1.dicom"), "200 100").unwrap();
    fs::write(input.join("test/t2.dicom"), "200 100").unwrap();
    // unreadable geometry
    fs::write(input.join("test/t3.dicom"), "0 0").unwrap();

    let output = dir.path().join("yolo");
    Fixture {
        _dir: dir,
        input,
        output,
    }
}

fn stems(dir: &Path, extension: &str) -> BTreeSet<String> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == extension))
        .map(|path| path.file_stem().unwrap().to_string_lossy().into_owned())
        .collect()
}

fn run(fixture: &Fixture, output: &Path, options: AssemblerOptions) -> dicom2yolo::DatasetReport {
    let registry = ClassRegistry::new(["A", "B"]);
    let mut assembler = DatasetAssembler::new(
        DatasetPaths::from_root(&fixture.input),
        output,
        &registry,
        &FakeMaterializer,
        options,
    );
    assembler.run().unwrap()
}

#[test]
fn converts_train_and_test_splits() {
    let fixture = fixture();
    let report = run(&fixture, &fixture.output, AssemblerOptions::default());

    assert_eq!(report.train.processed, 10);
    assert_eq!(report.train.stats.total_images, 11);
    assert_eq!(report.train.stats.skipped_missing_image, 1);
    assert_eq!(report.train.stats.dropped_unknown_class, 1);
    assert_eq!(report.train.stats.dropped_missing_geometry, 1);
    assert_eq!(report.train.stats.boxes_written, 2);

    assert_eq!(report.test.processed, 2);
    assert_eq!(report.test.stats.failed_conversions, 1);
    assert_eq!(report.test.stats.invalid_boxes, 1);

    let out = &fixture.output;
    assert_eq!(stems(&out.join("images/test"), "img"), stems(&out.join("labels/test"), "txt"));
    assert!(!out.join("images/test/t3.img").exists());
    assert!(!out.join("labels/test/t3.txt").exists());
    assert_eq!(
        fs::read_to_string(out.join("labels/test/t1.txt")).unwrap(),
        "0 1.000000 1.000000 0.100000 0.200000\n"
    );
    assert_eq!(fs::read_to_string(out.join("labels/test/t2.txt")).unwrap(), "");
}

#[test]
fn labels_match_expected_lines() {
    let fixture = fixture();
    run(&fixture, &fixture.output, AssemblerOptions {
        val_size: 0.0,
        ..AssemblerOptions::default()
    });

    let labels = fixture.output.join("labels/train");
    assert_eq!(
        fs::read_to_string(labels.join("img1.txt")).unwrap(),
        "0 0.200000 0.200000 0.200000 0.200000\n"
    );
    assert_eq!(
        fs::read_to_string(labels.join("img2.txt")).unwrap(),
        "1 0.250000 0.500000 0.500000 1.000000\n"
    );
    assert_eq!(fs::read_to_string(labels.join("img3.txt")).unwrap(), "");
    assert!(!labels.join("ghost.txt").exists());
}

#[test]
fn val_split_is_disjoint_total_and_sized() {
    let fixture = fixture();
    let report = run(&fixture, &fixture.output, AssemblerOptions::default());

    assert_eq!(report.split_counts.val, 2);
    assert_eq!(report.split_counts.train, 8);

    let out = &fixture.output;
    let train_images = stems(&out.join("images/train"), "img");
    let val_images = stems(&out.join("images/val"), "img");
    assert_eq!(train_images.len(), 8);
    assert_eq!(val_images.len(), 2);
    assert!(train_images.is_disjoint(&val_images));

    let all: BTreeSet<String> = train_images.union(&val_images).cloned().collect();
    let expected: BTreeSet<String> = (1..=10).map(|i| format!("img{i}")).collect();
    assert_eq!(all, expected);

    assert_eq!(train_images, stems(&out.join("labels/train"), "txt"));
    assert_eq!(val_images, stems(&out.join("labels/val"), "txt"));
}

#[test]
fn val_split_is_reproducible() {
    let fixture = fixture();
    let other = fixture.output.with_file_name("yolo-again");
    run(&fixture, &fixture.output, AssemblerOptions::default());
    run(&fixture, &other, AssemblerOptions::default());

    assert_eq!(
        stems(&fixture.output.join("images/val"), "img"),
        stems(&other.join("images/val"), "img")
    );
}

#[test]
fn reject_policy_drops_out_of_range_boxes() {
    let fixture = fixture();
    let report = run(&fixture, &fixture.output, AssemblerOptions {
        box_policy: BoxPolicy::Reject,
        ..AssemblerOptions::default()
    });

    assert_eq!(report.test.stats.invalid_boxes, 1);
    assert_eq!(report.test.stats.boxes_written, 0);
    assert_eq!(
        fs::read_to_string(fixture.output.join("labels/test/t1.txt")).unwrap(),
        ""
    );
}

#[test]
fn writes_manifest() {
    let fixture = fixture();
    let report = run(&fixture, &fixture.output, AssemblerOptions::default());

    assert_eq!(report.manifest_path, fixture.output.join("data.yaml"));
    let yaml = fs::read_to_string(&report.manifest_path).unwrap();
    let root = fs::canonicalize(&fixture.output).unwrap();
    assert_eq!(
        yaml,
        format!(
            "path: {}\ntrain: images/train\nval: images/val\ntest: images/test\nchannels: 1\n\nnc: 2\nnames:\n    0: A\n    1: B\n",
            root.display()
        )
    );
}

#[test]
fn parallel_workers_give_same_output() {
    let fixture = fixture();
    let other = fixture.output.with_file_name("yolo-parallel");
    let serial = run(&fixture, &fixture.output, AssemblerOptions::default());
    let parallel = run(&fixture, &other, AssemblerOptions {
        workers: 4,
        ..AssemblerOptions::default()
    });

    assert_eq!(serial.train.stats, parallel.train.stats);
    assert_eq!(serial.test.stats, parallel.test.stats);
    for split in ["train", "val", "test"] {
        let labels = stems(&fixture.output.join("labels").join(split), "txt");
        assert_eq!(labels, stems(&other.join("labels").join(split), "txt"));
        for stem in labels {
            let name = format!("{stem}.txt");
            assert_eq!(
                fs::read(fixture.output.join("labels").join(split).join(&name)).unwrap(),
                fs::read(other.join("labels").join(split).join(&name)).unwrap()
            );
        }
    }
}

#[test]
fn missing_test_tables_abort_the_run() {
    let fixture = fixture();
    fs::remove_file(fixture.input.join("annotations/annotations_test.csv")).unwrap();

    let registry = ClassRegistry::new(["A", "B"]);
    let mut assembler = DatasetAssembler::new(
        DatasetPaths::from_root(&fixture.input),
        &fixture.output,
        &registry,
        &FakeMaterializer,
        AssemblerOptions::default(),
    );
    let err = assembler.run().unwrap_err();
    assert!(matches!(err, ConvertError::Csv { .. }));
    assert!(!fixture.output.join("data.yaml").exists());
}

/// Writes a partial destination file, then fails.
struct FailingMaterializer;

impl ImageMaterializer for FailingMaterializer {
    fn extension(&self) -> &'static str {
        "img"
    }

    fn materialize(&self, _source: &Path, destination: &Path) -> Result<ImageGeometry> {
        fs::write(destination, "partial").map_err(|e| ConvertError::Io {
            path: destination.to_path_buf(),
            source: e,
        })?;
        Err(ConvertError::Io {
            path: destination.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "decoder gave up"),
        })
    }
}

#[test]
fn failed_materialization_leaves_no_image_behind() {
    let fixture = fixture();
    let registry = ClassRegistry::new(["A", "B"]);
    let mut assembler = DatasetAssembler::new(
        DatasetPaths::from_root(&fixture.input),
        &fixture.output,
        &registry,
        &FailingMaterializer,
        AssemblerOptions::default(),
    );
    let report = assembler.run().unwrap();

    assert_eq!(report.train.processed, 0);
    assert_eq!(report.train.stats.failed_conversions, 10);
    assert_eq!(report.train.stats.skipped_missing_image, 1);
    assert_eq!(report.test.stats.failed_conversions, 3);
    assert_eq!(report.split_counts.train, 0);
    assert_eq!(report.split_counts.val, 0);
    for split in ["train", "val", "test"] {
        assert!(stems(&fixture.output.join("images").join(split), "img").is_empty());
        assert!(stems(&fixture.output.join("labels").join(split), "txt").is_empty());
    }
}

#[test]
fn ids_sharing_a_file_name_keep_the_first() {
    let fixture = fixture();
    let annotations = fixture.input.join("annotations");
    let append = |path: PathBuf, text: &str| {
        let mut content = fs::read_to_string(&path).unwrap();
        content.push_str(text);
        fs::write(path, content).unwrap();
    };
    append(annotations.join("image_labels_train.csv"), "ab,R1,0\na:b,R1,0\n");
    append(
        annotations.join("annotations_train.csv"),
        "ab,R1,A,10,10,30,30\na:b,R1,B,0,0,50,50\n",
    );
    fs::write(fixture.input.join("train/ab.dicom"), "100 100").unwrap();
    fs::write(fixture.input.join("train/a:b.dicom"), "50 50").unwrap();

    let options = AssemblerOptions {
        val_size: 0.0,
        ..AssemblerOptions::default()
    };
    let report = run(&fixture, &fixture.output, options);

    assert_eq!(report.train.stats.total_images, 13);
    assert_eq!(report.train.processed, 11);
    assert_eq!(report.train.stats.skipped_name_clash, 1);

    let labels_dir = fixture.output.join("labels/train");
    let labels = stems(&labels_dir, "txt");
    assert_eq!(labels.len(), 11);
    assert!(labels.contains("ab"));
    assert_eq!(
        fs::read_to_string(labels_dir.join("ab.txt")).unwrap(),
        "0 0.200000 0.200000 0.200000 0.200000\n"
    );
    assert_eq!(
        fs::read_to_string(fixture.output.join("images/train/ab.img")).unwrap(),
        "100 100"
    );
}
