//! somtrace: annotate ESOM maps of metagenomic contigs
//!
//! `classify` writes an ESOM class file coloring map points either by whether
//! their contig is covered by reads in a BAM file, or by the taxon assigned to
//! the contig at a chosen rank. `extract` collects the per-read taxonomy
//! records of the reads aligned to each bin.

use clap::Parser;
use colored::*;
use log::{error, info};

mod bam_utils;
mod bins;
mod class_file;
mod classes;
mod config;
mod coverage;
mod error;
mod fasta_utils;
mod names;
mod palette;
mod taxa_index;

use bam_utils::BamAlignments;
use bins::extract_bins;
use class_file::write_classification;
use classes::{assign_binary, assign_taxonomic_from_path};
use config::{ClassifyConfig, Cli, Commands, ExtractConfig};
use coverage::{filter_references, CoverageGate};
use crate::error::Result;
use fasta_utils::ReferenceLengthTable;
use names::NameRegistry;
use taxa_index::TaxonomyOffsetIndex;

/// Main function
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // If no arguments provided, show banner and exit
    if std::env::args().len() <= 1 {
        display_banner();
        std::process::exit(0);
    }

    let cli = Cli::parse();
    let start_time = std::time::Instant::now();

    let outcome = match cli.command {
        Commands::Classify(args) => ClassifyConfig::try_from(args).and_then(run_classify),
        Commands::Extract(args) => run_extract(ExtractConfig::from(args)),
    };

    match outcome {
        Ok(_) => {
            let duration = start_time.elapsed();
            info!("Completed successfully in {:.2} seconds", duration.as_secs_f64());
        }
        Err(e) => {
            error!("Run failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn display_banner() {
    println!("{}", "somtrace".bright_green().bold());
    println!("{}", "Color and annotate ESOM maps of metagenomic contigs".cyan());
    println!();
    println!("USAGE:");
    println!("    somtrace classify [--bam <FILE>] --names <FILE> [OPTIONS] <OUT>");
    println!("    somtrace extract --bam <FILE> --taxonomy <FILE> --fasta <FILE>...");
    println!();
    println!("For full documentation, run:");
    println!("    somtrace --help");
    println!();
}

fn run_classify(config: ClassifyConfig) -> Result<()> {
    let gate = match &config.bam {
        Some(bam_path) => {
            let mut alignments = BamAlignments::open(bam_path)?;
            let lengths = match &config.fasta {
                Some(fasta_path) => ReferenceLengthTable::from_fasta(fasta_path)?,
                None => {
                    info!("No FASTA given, using reference lengths from the BAM header");
                    alignments.header_lengths()
                }
            };
            CoverageGate::Hits(filter_references(
                &mut alignments,
                &lengths,
                config.coverage_percent,
            )?)
        }
        None => CoverageGate::Unfiltered,
    };

    let names = NameRegistry::from_path(&config.names)?;
    let assignment = match &config.taxonomy {
        Some(selection) => {
            info!(
                "Coloring by taxonomy at rank '{}' from {}",
                selection.rank,
                selection.path.display()
            );
            assign_taxonomic_from_path(&names, &gate, &selection.path, &selection.rank)?
        }
        None => assign_binary(&names, &gate),
    };

    let (class_path, legend_path) =
        write_classification(&config.out, gate.hit_count(), &assignment)?;
    if let Some(legend_path) = legend_path {
        info!("Wrote taxon legend to {}", legend_path.display());
    }
    info!(
        "Wrote {} points in {} classes to {}",
        assignment.classes.len(),
        assignment.palette.len(),
        class_path.display()
    );
    Ok(())
}

fn run_extract(config: ExtractConfig) -> Result<()> {
    let mut index = TaxonomyOffsetIndex::from_path(&config.taxonomy)?;
    let mut alignments = BamAlignments::open(&config.bam)?;

    let reports = extract_bins(&config.bins, &config.output_dir, &mut alignments, &mut index)?;
    let lines: usize = reports.iter().map(|(_, report)| report.lines).sum();
    info!(
        "Extracted {} taxonomy lines for {} bins into {}",
        lines,
        reports.len(),
        config.output_dir.display()
    );
    Ok(())
}
