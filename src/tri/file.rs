use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::Triangular;
use crate::variants::Chromosome;
use crate::workspace::SharedWorkspace;
use crate::{Result, TriError};

// Floats are written with `{:e}`, the shortest scientific form that
// parses back to the identical bit pattern.

impl Triangular {
    /// Serialize to a gzip-compressed text file.
    ///
    /// Four header lines carry the metadata (sample identifiers joined
    /// with commas, so they must not contain commas themselves),
    /// followed by one tab-separated line per matrix row.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(GzEncoder::new(file, Compression::default()));

        writeln!(writer, "#chromosome={}", self.chromosome)?;
        writeln!(writer, "#samples={}", self.samples.join(","))?;
        writeln!(writer, "#variant_count={}", self.variant_count)?;
        writeln!(writer, "#maf_cutoff={:e}", self.maf_cutoff)?;

        let view = self.view.view();
        let mut line = String::new();
        for r in 0..view.nrows() {
            line.clear();
            for (c, value) in view.row(r).iter().enumerate() {
                if c > 0 {
                    line.push('\t');
                }
                line.push_str(&format!("{value:e}"));
            }
            writeln!(writer, "{line}")?;
        }

        writer
            .into_inner()
            .map_err(|e| e.into_error())?
            .finish()?;
        Ok(())
    }

    /// Read an artifact back, allocating its view through the workspace
    pub fn from_file(path: &Path, workspace: &Arc<SharedWorkspace>) -> Result<Triangular> {
        let file = File::open(path)?;
        let mut lines = BufReader::new(GzDecoder::new(file)).lines();
        let mut line_number = 0usize;

        let mut next_line = |expectation: &str| -> Result<String> {
            line_number += 1;
            lines.next().transpose()?.ok_or_else(|| TriError::Parse {
                path: path.to_path_buf(),
                line: line_number,
                message: format!("unexpected end of file, expected {expectation}"),
            })
        };
        let header = |line_number: usize, line: &str, key: &str| -> Result<String> {
            line.strip_prefix('#')
                .and_then(|rest| rest.strip_prefix(key))
                .and_then(|rest| rest.strip_prefix('='))
                .map(str::to_owned)
                .ok_or_else(|| TriError::Parse {
                    path: path.to_path_buf(),
                    line: line_number,
                    message: format!("expected #{key}= header"),
                })
        };
        let parse_error = |line: usize, message: String| TriError::Parse {
            path: path.to_path_buf(),
            line,
            message,
        };

        let chromosome: Chromosome = header(1, &next_line("#chromosome=")?, "chromosome")?
            .parse()
            .map_err(|e: crate::variants::ChromosomeParseError| parse_error(1, e.to_string()))?;
        let samples: Vec<String> = header(2, &next_line("#samples=")?, "samples")?
            .split(',')
            .map(str::to_owned)
            .collect();
        let variant_count: usize = header(3, &next_line("#variant_count=")?, "variant_count")?
            .parse()
            .map_err(|_| parse_error(3, "variant count is not an integer".into()))?;
        let maf_cutoff: f64 = header(4, &next_line("#maf_cutoff=")?, "maf_cutoff")?
            .parse()
            .map_err(|_| parse_error(4, "cutoff is not a number".into()))?;

        let sample_count = samples.len();
        let name = workspace.next_name(&format!("chr{chromosome}-tri"));
        let mut view = workspace.alloc(&name, sample_count, sample_count)?;

        {
            let mut matrix = view.view_mut();
            for r in 0..sample_count {
                let line_no = 4 + r + 1;
                let line = next_line("a matrix row")?;
                let mut fields = line.split('\t');
                let mut filled = 0;
                for (slot, field) in matrix.row_mut(r).iter_mut().zip(&mut fields) {
                    *slot = field
                        .parse()
                        .map_err(|_| parse_error(line_no, format!("not a number: {field:?}")))?;
                    filled += 1;
                }
                if filled != sample_count || fields.next().is_some() {
                    return Err(parse_error(
                        line_no,
                        format!("expected {sample_count} columns"),
                    ));
                }
            }
        }

        Triangular::new(view, chromosome, samples, variant_count, maf_cutoff)
    }
}
