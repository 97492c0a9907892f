//! End-to-end segmentation on NIfTI files written to a temporary directory

use std::path::Path;

use ndarray::Array3;
use voxpart::components::label_components;
use voxpart::{segment_image, Error, LabelVolume, SegmentOptions};

fn write_volume(path: &Path, data: Array3<i16>) {
    LabelVolume::new(data).write(path).unwrap();
}

/// 10x10x10 image with a 6x6x6 foreground cube in the middle
fn cube() -> Array3<i16> {
    let mut data = Array3::<i16>::zeros((10, 10, 10));
    for ((x, y, z), v) in data.indexed_iter_mut() {
        if (2..8).contains(&x) && (2..8).contains(&y) && (2..8).contains(&z) {
            *v = 1;
        }
    }
    data
}

#[test]
fn test_binary_cube_into_two_parts() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("cube.nii.gz");
    let output = dir.path().join("parts.nii.gz");
    let data = cube();
    write_volume(&input, data.clone());

    let options = SegmentOptions {
        seed: Some(5),
        ..Default::default()
    };
    let summary = segment_image(&input, &output, 2, &options).unwrap();
    let parts = LabelVolume::read(&output).unwrap();

    assert_eq!(parts.dim(), (10, 10, 10));
    for (c, &label) in parts.data().indexed_iter() {
        if data[c] == 0 {
            assert_eq!(label, 0, "background changed at {c:?}");
        } else {
            assert!(label == 1 || label == 2, "unexpected label {label} at {c:?}");
        }
    }
    assert_eq!(summary.n_labels(), 2);
    assert_eq!(summary.foreground_voxels, 216);

    // each part is a single face-connected region
    for label in [1, 2] {
        let mask = parts.data().mapv(|l| i16::from(l == label));
        assert_eq!(label_components(&mask).n_components(), 1);
    }
}

#[test]
fn test_small_component_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("two.nii.gz");
    let output = dir.path().join("parts.nii.gz");

    // 800 voxels on the left, 200 on the right, separated by an empty slab
    let mut data = Array3::<i16>::zeros((14, 10, 10));
    for ((x, _, z), v) in data.indexed_iter_mut() {
        if x < 8 || (x >= 10 && z < 5) {
            *v = 1;
        }
    }
    write_volume(&input, data);

    let options = SegmentOptions {
        max_components: 2,
        min_component_fraction: 0.3,
        seed: Some(1),
        ..Default::default()
    };
    let summary = segment_image(&input, &output, 4, &options).unwrap();
    let parts = LabelVolume::read(&output).unwrap();

    assert_eq!(summary.n_components, 2);
    assert_eq!(summary.components.len(), 1);
    assert_eq!(summary.components[0].voxels, 800);
    assert_eq!(summary.components[0].n_parts, 3);
    for x in 10..14 {
        for y in 0..10 {
            for z in 0..10 {
                assert_eq!(parts.get([x, y, z]), 0);
            }
        }
    }
    assert!(parts.data().iter().any(|&l| l > 0));
}

#[test]
fn test_weight_mismatch_fails_before_reading() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("does-not-exist.nii.gz");
    let output = dir.path().join("parts.nii.gz");

    let options = SegmentOptions {
        weights: vec![0.5, 0.5],
        ..Default::default()
    };
    let err = segment_image(&input, &output, 3, &options).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)), "{err}");
    assert!(!output.exists());
}

#[test]
fn test_missing_input_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = segment_image(
        &dir.path().join("missing.nii"),
        &dir.path().join("out.nii"),
        2,
        &SegmentOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Io(_)), "{err}");
}

#[test]
fn test_seeded_optimisation_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("cube.nii.gz");
    write_volume(&input, cube());

    let options = SegmentOptions {
        optimize: true,
        seed: Some(42),
        ..Default::default()
    };
    let first = dir.path().join("a.nii.gz");
    let second = dir.path().join("b.nii.gz");
    let sa = segment_image(&input, &first, 3, &options).unwrap();
    let sb = segment_image(&input, &second, 3, &options).unwrap();

    assert_eq!(sa, sb);
    assert_eq!(sa.components[0].weights.len(), 3);
    assert_eq!(sa.components[0].search_evaluations, 101);
    let a = LabelVolume::read(&first).unwrap();
    let b = LabelVolume::read(&second).unwrap();
    assert_eq!(a.data(), b.data());
}

#[test]
fn test_hints_exclude_voxels() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("cube.nii.gz");
    let output = dir.path().join("parts.nii.gz");
    let hints = dir.path().join("hints.txt");

    // intensity 5 on one face of the cube, excluded from the graph
    let mut data = cube();
    for y in 2..8 {
        for z in 2..8 {
            data[[2, y, z]] = 5;
        }
    }
    write_volume(&input, data);
    std::fs::write(&hints, "# drop the face\nV 5 0\nE * * 3\n").unwrap();

    let options = SegmentOptions {
        hints: Some(hints),
        seed: Some(8),
        ..Default::default()
    };
    let summary = segment_image(&input, &output, 2, &options).unwrap();
    let parts = LabelVolume::read(&output).unwrap();

    assert_eq!(summary.components[0].vertices, 216 - 36);
    assert_eq!(parts.get([2, 4, 4]), 0);
    assert!(parts.get([3, 4, 4]) > 0);
}

#[test]
fn test_bad_hint_file_reports_line() {
    let dir = tempfile::tempdir().unwrap();
    let hints = dir.path().join("hints.txt");
    std::fs::write(&hints, "V * 2\nQ 1 2\n").unwrap();

    let options = SegmentOptions {
        hints: Some(hints),
        ..Default::default()
    };
    let err = segment_image(
        &dir.path().join("missing.nii"),
        &dir.path().join("out.nii"),
        2,
        &options,
    )
    .unwrap_err();
    assert!(matches!(err, Error::HintFile { line: 2, .. }), "{err}");
}
