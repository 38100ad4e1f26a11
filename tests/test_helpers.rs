//! Shared helpers for building deterministic dosage fixtures

#![allow(dead_code)]

use gwas_tri::{Chromosome, MemoryVariantFile};
use ndarray::Array2;

/// Ordered sample identifiers `sample0..sampleN`
pub fn sample_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("sample{i}")).collect()
}

/// Deterministic variants × samples dosage matrix.
///
/// Dosages are kept inside [0.2, 1.8] so every variant passes any
/// cutoff up to 0.1 and no row is monomorphic.
pub fn dosage_matrix(variants: usize, samples: usize, seed: u64) -> Array2<f64> {
    let mut state = seed.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
    Array2::from_shape_fn((variants, samples), |_| {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let unit = (state >> 11) as f64 / (1u64 << 53) as f64;
        0.2 + 1.6 * unit
    })
}

/// In-memory variant file over a deterministic dosage matrix
pub fn memory_file(
    chromosome: Chromosome,
    variants: usize,
    samples: usize,
    seed: u64,
) -> MemoryVariantFile {
    MemoryVariantFile::new(
        chromosome,
        sample_names(samples),
        dosage_matrix(variants, samples, seed),
    )
    .expect("fixture dimensions are consistent")
}

/// Centre and standardise rows the way the pipeline does, for building
/// reference Gram matrices
pub fn scale_reference(matrix: &mut Array2<f64>) {
    for mut row in matrix.rows_mut() {
        let mean = row.sum() / row.len() as f64;
        let p = mean / 2.0;
        let sigma = (2.0 * p * (1.0 - p)).sqrt();
        row.mapv_inplace(|x| (x - mean) / sigma);
    }
}

/// Squared Frobenius norm, for scaling tolerances
pub fn norm_sq(matrix: &Array2<f64>) -> f64 {
    matrix.iter().map(|x| x * x).sum()
}
