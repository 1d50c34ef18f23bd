//! Command-line arguments and the validated run configurations built from them.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use colored::*;
use log::warn;

use crate::coverage::DEFAULT_COVERAGE_PERCENT;
use crate::error::{Result, TraceError};

#[derive(Parser, Debug)]
#[command(author, version, about, after_help = examples())]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write an ESOM class file coloring points by read coverage or taxonomy
    Classify(ClassifyArgs),
    /// Extract per-read taxonomy records for every bin
    Extract(ExtractArgs),
}

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Indexed BAM file of reads aligned to the contigs
    #[arg(long, value_name = "FILE")]
    pub bam: Option<PathBuf>,

    /// NAMES file of the ESOM map
    #[arg(long, value_name = "FILE")]
    pub names: PathBuf,

    /// FASTA of the contigs, used for reference lengths (defaults to the BAM header)
    #[arg(long, value_name = "FILE")]
    pub fasta: Option<PathBuf>,

    /// Taxonomy summary table (sequence_taxa_summary) to color by
    #[arg(long, value_name = "FILE")]
    pub taxonomy: Option<PathBuf>,

    /// Taxonomic rank to color by, e.g. genus
    #[arg(long, alias = "tax_level", value_name = "RANK")]
    pub tax_level: Option<String>,

    /// Minimum percentage of reference positions covered by reads
    #[arg(short, long, default_value_t = DEFAULT_COVERAGE_PERCENT, value_name = "PCT")]
    pub coverage: f64,

    /// Output prefix; ".cls" (and ".taxa") will be added
    #[arg(value_name = "OUT")]
    pub out: PathBuf,
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Indexed BAM file mapping all reads to the bins
    #[arg(short, long, value_name = "FILE")]
    pub bam: PathBuf,

    /// Directory for the per-bin summaries
    #[arg(short = 'd', long, default_value = ".", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// FASTA files, one per bin
    #[arg(short, long, num_args = 1.., required = true, value_name = "FILE")]
    pub fasta: Vec<PathBuf>,

    /// Taxonomy summary for all reads possibly mapping to the bins
    #[arg(short, long, value_name = "FILE")]
    pub taxonomy: PathBuf,
}

fn examples() -> String {
    format!(
        "{}:\n  {} classify --bam reads.bam --fasta contigs.fa --names map.names -c 60 hits\n  {} classify --names map.names --taxonomy taxa_summary.txt --tax-level genus genera\n  {} extract -b reads.bam -t taxa_summary.txt -f bin1.fa bin2.fa -d summaries",
        "Examples".underline().cyan(),
        "somtrace".green(),
        "somtrace".green(),
        "somtrace".green()
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaxonomySelection {
    pub path: PathBuf,
    pub rank: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifyConfig {
    pub bam: Option<PathBuf>,
    pub fasta: Option<PathBuf>,
    pub names: PathBuf,
    pub taxonomy: Option<TaxonomySelection>,
    pub coverage_percent: f64,
    pub out: PathBuf,
}

impl TryFrom<ClassifyArgs> for ClassifyConfig {
    type Error = TraceError;

    fn try_from(args: ClassifyArgs) -> Result<Self> {
        let taxonomy = match (args.taxonomy, args.tax_level) {
            (Some(path), Some(rank)) => Some(TaxonomySelection {
                path,
                rank: rank.to_lowercase(),
            }),
            (Some(_), None) => return Err(TraceError::MissingRank),
            (None, Some(rank)) => {
                warn!("--tax-level {} ignored without --taxonomy", rank);
                None
            }
            (None, None) => None,
        };

        if !(0.0..=100.0).contains(&args.coverage) {
            return Err(TraceError::InvalidCoverage(args.coverage));
        }
        if args.bam.is_none() && args.fasta.is_some() {
            warn!("--fasta only supplies reference lengths for --bam; ignoring it");
        }

        Ok(ClassifyConfig {
            fasta: args.fasta.filter(|_| args.bam.is_some()),
            bam: args.bam,
            names: args.names,
            taxonomy,
            coverage_percent: args.coverage,
            out: args.out,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractConfig {
    pub bam: PathBuf,
    pub taxonomy: PathBuf,
    pub bins: Vec<PathBuf>,
    pub output_dir: PathBuf,
}

impl From<ExtractArgs> for ExtractConfig {
    fn from(args: ExtractArgs) -> Self {
        ExtractConfig {
            bam: args.bam,
            taxonomy: args.taxonomy,
            bins: args.fasta,
            output_dir: args.output_dir,
        }
    }
}
