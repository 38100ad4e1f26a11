use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use gwas_tri::{calc_tri, Chromosome, MafCutoff, SharedWorkspace, TextDosageFile, VariantFile};

#[derive(Parser, Debug)]
#[command(
    name = "gwas-tri",
    about = "Triangularize per-chromosome GWAS dosage matrices for SVD"
)]
struct Cli {
    /// Dosage files, one per chromosome (plain or gzipped text)
    #[arg(required = true)]
    dosages: Vec<PathBuf>,

    /// Pre-existing triangular files to reuse when their samples match
    #[arg(long = "tri", value_name = "PATH")]
    tri: Vec<PathBuf>,

    /// Directory for newly written triangular files
    #[arg(long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Minor allele frequency cutoff
    #[arg(long, value_name = "CUT", default_value_t = MafCutoff::DEFAULT)]
    maf: f64,

    /// Shared workspace capacity in bytes
    #[arg(long, value_name = "BYTES", default_value_t = 1 << 30)]
    workspace_size: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut files: BTreeMap<Chromosome, TextDosageFile> = BTreeMap::new();
    for path in &cli.dosages {
        let file = TextDosageFile::open(path)
            .with_context(|| format!("failed to open dosage file {}", path.display()))?;
        let chromosome = file.chromosome();
        if files.insert(chromosome, file).is_some() {
            bail!("chromosome {chromosome} is covered by more than one dosage file");
        }
    }
    let chromosomes: Vec<Chromosome> = files.keys().copied().collect();

    let workspace = SharedWorkspace::new(cli.workspace_size);
    let paths = calc_tri(
        &chromosomes,
        files,
        &cli.output_dir,
        workspace,
        &cli.tri,
        cli.maf,
    )
    .context("triangularization failed")?;

    for (chromosome, path) in paths {
        println!("chr{chromosome}\t{}", path.display());
    }
    Ok(())
}
