use ndarray::ArrayViewMut2;

use crate::{Result, TriError};

/// Centre and standardise a dosage block per variant (row).
///
/// For each row the mean `μ` estimates twice the allele frequency, so
/// the row is centred by `μ` and divided by `σ = sqrt(2p(1 - p))` with
/// `p = μ / 2`. The upstream frequency filter rejects monomorphic
/// variants; a zero or non-finite `σ` that slips through fails with
/// [`TriError::NumericDegeneracy`].
pub fn scale_rows(mut block: ArrayViewMut2<'_, f64>) -> Result<()> {
    for (row_index, mut row) in block.rows_mut().into_iter().enumerate() {
        let mean = row.sum() / row.len() as f64;
        let frequency = mean / 2.0;
        let standard_deviation = (2.0 * frequency * (1.0 - frequency)).sqrt();
        if !(standard_deviation > 0.0) || !standard_deviation.is_finite() {
            return Err(TriError::NumericDegeneracy { row: row_index });
        }
        row.mapv_inplace(|dosage| (dosage - mean) / standard_deviation);
    }
    Ok(())
}
