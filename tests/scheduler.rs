//! Admission scheduling across chromosomes

use std::collections::BTreeMap;
use std::path::Path;

use gwas_tri::workspace::ELEM_SIZE;
use gwas_tri::{
    calc_tri, Chromosome, MemoryVariantFile, SharedWorkspace, TriError, Triangular,
};

mod test_helpers;
use test_helpers::*;

const SAMPLES: usize = 4;
const CHR21: Chromosome = Chromosome::Autosome(21);
const CHR22: Chromosome = Chromosome::Autosome(22);

fn files_for(
    chromosomes: &[Chromosome],
    variants: usize,
) -> BTreeMap<Chromosome, MemoryVariantFile> {
    chromosomes
        .iter()
        .enumerate()
        .map(|(i, &chromosome)| {
            (
                chromosome,
                memory_file(chromosome, variants, SAMPLES, 17 + i as u64),
            )
        })
        .collect()
}

fn write_artifact(dir: &Path, chromosome: Chromosome, samples: Vec<String>, variant_count: usize) {
    let workspace = SharedWorkspace::new(1 << 16);
    let count = samples.len();
    let view = workspace.alloc("seed", count, count).unwrap();
    let tri = Triangular::new(view, chromosome, samples, variant_count, 0.05).unwrap();
    tri.to_file(&dir.join(Triangular::file_name(chromosome))).unwrap();
    tri.free();
}

#[test]
fn stale_cache_is_recomputed() {
    let dir = tempfile::tempdir().unwrap();
    // An artifact computed for a different cohort.
    write_artifact(
        dir.path(),
        CHR21,
        vec!["other0".into(), "other1".into(), "other2".into(), "other3".into()],
        999,
    );

    let workspace = SharedWorkspace::new(1 << 20);
    let paths = calc_tri(
        &[CHR21],
        files_for(&[CHR21], 10),
        dir.path(),
        workspace,
        &[],
        0.05,
    )
    .unwrap();

    let reader = SharedWorkspace::new(1 << 20);
    let restored = Triangular::from_file(&paths[&CHR21], &reader).unwrap();
    assert_eq!(restored.samples(), sample_names(SAMPLES));
    assert_eq!(restored.variant_count(), 10, "the stale file must be overwritten");
}

#[test]
fn matching_cache_is_adopted_even_when_reordered() {
    let dir = tempfile::tempdir().unwrap();
    // Same sample set, different order; the sentinel variant count
    // proves the file was not recomputed.
    let mut reordered = sample_names(SAMPLES);
    reordered.reverse();
    write_artifact(dir.path(), CHR21, reordered, 999);

    let workspace = SharedWorkspace::new(1 << 20);
    let paths = calc_tri(
        &[CHR21],
        files_for(&[CHR21], 10),
        dir.path(),
        workspace,
        &[],
        0.05,
    )
    .unwrap();

    let reader = SharedWorkspace::new(1 << 20);
    let restored = Triangular::from_file(&paths[&CHR21], &reader).unwrap();
    assert_eq!(restored.variant_count(), 999);
}

#[test]
fn chromosome_x_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let chromosomes = [CHR21, CHR22, Chromosome::X];
    let workspace = SharedWorkspace::new(1 << 20);

    let paths = calc_tri(
        &chromosomes,
        files_for(&chromosomes, 8),
        dir.path(),
        workspace,
        &[],
        0.05,
    )
    .unwrap();

    assert_eq!(paths.keys().copied().collect::<Vec<_>>(), vec![CHR21, CHR22]);
    assert!(!dir.path().join(Triangular::file_name(Chromosome::X)).exists());
}

#[test]
fn a_workspace_too_small_for_two_jobs_still_finishes_both() {
    let dir = tempfile::tempdir().unwrap();
    let variants = 8;
    // Room for one whole file plus retained factors, far short of two.
    let capacity = ELEM_SIZE * SAMPLES * variants + 3 * ELEM_SIZE * SAMPLES * SAMPLES;
    let workspace = SharedWorkspace::new(capacity);

    let paths = calc_tri(
        &[CHR21, CHR22],
        files_for(&[CHR21, CHR22], variants),
        dir.path(),
        workspace,
        &[],
        0.05,
    )
    .unwrap();

    let reader = SharedWorkspace::new(1 << 20);
    for chromosome in [CHR21, CHR22] {
        let restored = Triangular::from_file(&paths[&chromosome], &reader).unwrap();
        assert_eq!(restored.chromosome(), chromosome);
        assert_eq!(restored.variant_count(), variants);
    }
}

#[test]
fn worker_failures_surface_with_their_chromosome() {
    let dir = tempfile::tempdir().unwrap();
    let mut files = files_for(&[CHR21], 8);
    // Every chr22 variant is monomorphic and gets filtered out.
    files.insert(
        CHR22,
        MemoryVariantFile::new(
            CHR22,
            sample_names(SAMPLES),
            ndarray::Array2::zeros((8, SAMPLES)),
        )
        .unwrap(),
    );

    let workspace = SharedWorkspace::new(1 << 20);
    let result = calc_tri(&[CHR21, CHR22], files, dir.path(), workspace, &[], 0.05);

    match result {
        Err(TriError::Worker { chromosome, source }) => {
            assert_eq!(chromosome, CHR22);
            assert!(matches!(*source, TriError::EmptyFilter { .. }));
        }
        other => panic!("expected a worker failure, got {other:?}"),
    }
    assert!(!dir.path().join(Triangular::file_name(CHR22)).exists());
}

#[test]
fn supplied_tri_paths_are_preferred_over_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let elsewhere = tempfile::tempdir().unwrap();
    let tri_path = elsewhere.path().join(Triangular::file_name(CHR21));
    {
        let workspace = SharedWorkspace::new(1 << 16);
        let view = workspace.alloc("seed", SAMPLES, SAMPLES).unwrap();
        let tri = Triangular::new(view, CHR21, sample_names(SAMPLES), 777, 0.05).unwrap();
        tri.to_file(&tri_path).unwrap();
        tri.free();
    }

    let workspace = SharedWorkspace::new(1 << 20);
    let paths = calc_tri(
        &[CHR21],
        files_for(&[CHR21], 10),
        dir.path(),
        workspace,
        std::slice::from_ref(&tri_path),
        0.05,
    )
    .unwrap();

    assert_eq!(paths[&CHR21], tri_path);
    assert!(
        !dir.path().join(Triangular::file_name(CHR21)).exists(),
        "no new file is computed when a supplied one matches"
    );
}
