//! Variant files and the allele frequency filter
//!
//! The triangularization core only needs a narrow capability interface
//! over a variant file: metadata accessors and a `read` that fills a
//! caller-supplied block with the dosages of consecutive unread
//! variants passing a predicate. Two back-ends implement it: a
//! streaming text reader for plain or gzipped dosage matrices and an
//! in-memory file for embedders and tests.

mod memory;
mod text;

pub use memory::MemoryVariantFile;
pub use text::TextDosageFile;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::workspace::ArrayView;
use crate::{Result, TriError};

/// A chromosome label: an autosome number or the sex chromosome X
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Chromosome {
    /// Autosome, numbered from 1
    Autosome(u8),
    /// Sex chromosome X; excluded from triangularization
    X,
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chromosome::Autosome(number) => write!(f, "{number}"),
            Chromosome::X => write!(f, "X"),
        }
    }
}

/// Error parsing a chromosome label
#[derive(Debug, Clone, Error)]
#[error("invalid chromosome label {0:?}")]
pub struct ChromosomeParseError(String);

impl FromStr for Chromosome {
    type Err = ChromosomeParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches("chr");
        if s.eq_ignore_ascii_case("x") {
            return Ok(Chromosome::X);
        }
        match s.parse::<u8>() {
            Ok(number) if number >= 1 => Ok(Chromosome::Autosome(number)),
            _ => Err(ChromosomeParseError(s.to_owned())),
        }
    }
}

/// Minor allele frequency predicate.
///
/// Accepts a variant iff `min(p, 1 - p) >= cutoff` where `p` is the
/// allele frequency estimated from the variant's dosages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MafCutoff {
    cutoff: f64,
}

impl MafCutoff {
    /// Default cutoff used by the pipeline
    pub const DEFAULT: f64 = 0.05;

    /// Validate and wrap a cutoff in `[0, 0.5]`
    pub fn new(cutoff: f64) -> Result<Self> {
        if !(0.0..=0.5).contains(&cutoff) {
            return Err(TriError::InvalidCutoff(cutoff));
        }
        Ok(Self { cutoff })
    }

    /// The wrapped cutoff value
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Whether a variant with these dosages passes the filter
    pub fn accepts(&self, dosages: &[f64]) -> bool {
        if dosages.is_empty() {
            return false;
        }
        let mean: f64 = dosages.iter().sum::<f64>() / dosages.len() as f64;
        let frequency = mean / 2.0;
        frequency.min(1.0 - frequency) >= self.cutoff
    }
}

/// Capability interface over an opened variant file.
///
/// Implementations keep a cursor over unread variants; `read` advances
/// it. All dosages are 64-bit floats in `[0, 2]`.
pub trait VariantFile {
    /// Number of samples per variant
    fn sample_count(&self) -> usize {
        self.samples().len()
    }

    /// Unread variants remaining, honouring any variant-index
    /// selection; equals the file's total before the first `read`
    fn variant_count(&self) -> usize;

    /// Ordered sample identifiers
    fn samples(&self) -> &[String];

    /// The chromosome this file covers
    fn chromosome(&self) -> Chromosome;

    /// Where the file lives (synthetic for in-memory back-ends)
    fn file_path(&self) -> &Path;

    /// Fill consecutive logical rows of `block` (oriented variants ×
    /// samples) with the dosages of unread variants that satisfy
    /// `predicate`, and return the number of rows written.
    ///
    /// One call consumes at most `block.rows()` raw variants; rejected
    /// variants spend that budget without producing a row, so the
    /// returned count may be smaller even before the file is exhausted.
    fn read(&mut self, block: &mut ArrayView, predicate: &MafCutoff) -> Result<usize>;
}

/// Parse one dosage, enforcing the `[0, 2]` domain
pub(crate) fn parse_dosage(field: &str) -> std::result::Result<f64, String> {
    let dosage: f64 = field
        .parse()
        .map_err(|_| format!("not a number: {field:?}"))?;
    if !(0.0..=2.0).contains(&dosage) {
        return Err(format!("dosage {dosage} is outside [0, 2]"));
    }
    Ok(dosage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn chromosome_labels_round_trip() {
        for label in ["1", "22", "X"] {
            let chromosome: Chromosome = label.parse().unwrap();
            assert_eq!(chromosome.to_string(), label);
        }
        assert_eq!("chr21".parse::<Chromosome>().unwrap(), Chromosome::Autosome(21));
        assert!("banana".parse::<Chromosome>().is_err());
        assert!("0".parse::<Chromosome>().is_err());
    }

    // p = mean / 2 over four samples
    #[test_case(&[0.0, 0.0, 0.0, 0.4], 0.05, true; "maf exactly at the cutoff")]
    #[test_case(&[0.0, 0.0, 0.0, 0.2], 0.05, false; "maf below the cutoff")]
    #[test_case(&[2.0, 2.0, 2.0, 1.6], 0.05, true; "major allele flipped at the cutoff")]
    #[test_case(&[2.0, 2.0, 2.0, 2.0], 0.05, false; "monomorphic variant")]
    #[test_case(&[1.0, 1.0, 1.0, 1.0], 0.5, true; "balanced variant at the widest cutoff")]
    #[test_case(&[0.0, 2.0, 0.0, 0.0], 0.3, false; "rare variant under a strict cutoff")]
    fn maf_predicate(dosages: &[f64], cutoff: f64, expected: bool) {
        let predicate = MafCutoff::new(cutoff).unwrap();
        assert_eq!(predicate.accepts(dosages), expected);
    }

    #[test]
    fn cutoff_domain_is_enforced() {
        assert!(MafCutoff::new(0.0).is_ok());
        assert!(MafCutoff::new(0.5).is_ok());
        assert!(matches!(
            MafCutoff::new(0.6),
            Err(TriError::InvalidCutoff(_))
        ));
        assert!(matches!(
            MafCutoff::new(-0.1),
            Err(TriError::InvalidCutoff(_))
        ));
    }
}
