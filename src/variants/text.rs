use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use super::{parse_dosage, Chromosome, MafCutoff, VariantFile};
use crate::workspace::ArrayView;
use crate::{Result, TriError};

/// Streaming reader for dosage matrices in tab-separated text: the
/// reference back-end.
///
/// Layout: a `#chromosome=` directive line, a header line naming the
/// sample columns, then one line per variant holding an identifier and
/// one dosage per sample. Files ending in `.gz` are decompressed on
/// the fly. The whole file is scanned once at open to fix the variant
/// count; reading then streams line by line.
pub struct TextDosageFile {
    path: PathBuf,
    chromosome: Chromosome,
    samples: Vec<String>,
    variant_count: usize,
    /// Raw line indices offered to `read`; `None` means all
    selected: Option<BTreeSet<usize>>,
    lines: std::io::Lines<Box<dyn BufRead + Send>>,
    /// Raw index of the next unread variant
    next_raw: usize,
    /// Selected variants already handed to `read`
    read_so_far: usize,
    /// 1-based line number for error reporting
    line_number: usize,
}

impl std::fmt::Debug for TextDosageFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextDosageFile")
            .field("path", &self.path)
            .field("chromosome", &self.chromosome)
            .field("sample_count", &self.samples.len())
            .field("variant_count", &self.variant_count)
            .finish()
    }
}

fn open_reader(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

impl TextDosageFile {
    /// Open a dosage file, validating its header and counting variants
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut header = open_reader(&path)?.lines();
        let parse_error = |line: usize, message: String| TriError::Parse {
            path: path.clone(),
            line,
            message,
        };

        let directive = header
            .next()
            .transpose()?
            .ok_or_else(|| parse_error(1, "empty file".into()))?;
        let chromosome = directive
            .strip_prefix("#chromosome=")
            .ok_or_else(|| parse_error(1, "expected a #chromosome= directive".into()))?
            .parse::<Chromosome>()
            .map_err(|e| parse_error(1, e.to_string()))?;

        let sample_line = header
            .next()
            .transpose()?
            .ok_or_else(|| parse_error(2, "missing sample header".into()))?;
        let mut columns = sample_line.split('\t');
        if columns.next() != Some("variant_id") {
            return Err(parse_error(2, "header must start with variant_id".into()));
        }
        let samples: Vec<String> = columns.map(str::to_owned).collect();
        if samples.is_empty() {
            return Err(parse_error(2, "no sample columns".into()));
        }

        let variant_count = header
            .filter(|line| !matches!(line.as_deref(), Ok("")))
            .count();

        // Re-open for streaming and skip the two header lines.
        let mut lines = open_reader(&path)?.lines();
        lines.next().transpose()?;
        lines.next().transpose()?;

        Ok(Self {
            path,
            chromosome,
            samples,
            variant_count,
            selected: None,
            lines,
            next_raw: 0,
            read_so_far: 0,
            line_number: 2,
        })
    }

    /// Restrict reading to the given raw variant indices
    pub fn with_variant_indices(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        let selected: BTreeSet<usize> = indices
            .into_iter()
            .filter(|&i| i < self.variant_count)
            .collect();
        self.variant_count = selected.len();
        self.selected = Some(selected);
        self
    }

    /// The next unselected lines are skipped without spending budget;
    /// returns the next selected data line, or `None` at end of file.
    fn next_selected_line(&mut self) -> Result<Option<String>> {
        loop {
            let Some(line) = self.lines.next().transpose()? else {
                return Ok(None);
            };
            self.line_number += 1;
            if line.is_empty() {
                continue;
            }
            let raw = self.next_raw;
            self.next_raw += 1;
            match &self.selected {
                Some(selected) if !selected.contains(&raw) => continue,
                _ => {
                    self.read_so_far += 1;
                    return Ok(Some(line));
                }
            }
        }
    }

    fn parse_line(&self, line: &str, dosages: &mut [f64]) -> Result<()> {
        let mut fields = line.split('\t');
        let _variant_id = fields.next();
        let mut filled = 0;
        for (slot, field) in dosages.iter_mut().zip(&mut fields) {
            *slot = parse_dosage(field).map_err(|message| TriError::Parse {
                path: self.path.clone(),
                line: self.line_number,
                message,
            })?;
            filled += 1;
        }
        if filled != dosages.len() || fields.next().is_some() {
            return Err(TriError::Parse {
                path: self.path.clone(),
                line: self.line_number,
                message: format!("expected {} dosage fields", dosages.len()),
            });
        }
        Ok(())
    }
}

impl VariantFile for TextDosageFile {
    fn variant_count(&self) -> usize {
        self.variant_count - self.read_so_far
    }

    fn samples(&self) -> &[String] {
        &self.samples
    }

    fn chromosome(&self) -> Chromosome {
        self.chromosome
    }

    fn file_path(&self) -> &Path {
        &self.path
    }

    fn read(&mut self, block: &mut ArrayView, predicate: &MafCutoff) -> Result<usize> {
        if block.cols() != self.sample_count() {
            return Err(TriError::ShapeMismatch(format!(
                "block is {} samples wide but the file has {}",
                block.cols(),
                self.sample_count()
            )));
        }

        let budget = block.rows();
        let mut dosages = vec![0.0; self.sample_count()];
        let mut view = block.view_mut();
        let mut written = 0;
        for _ in 0..budget {
            let Some(line) = self.next_selected_line()? else {
                break;
            };
            self.parse_line(&line, &mut dosages)?;
            if predicate.accepts(&dosages) {
                view.row_mut(written)
                    .iter_mut()
                    .zip(&dosages)
                    .for_each(|(dst, &dosage)| *dst = dosage);
                written += 1;
            }
        }
        Ok(written)
    }
}
