//! Coverage gating of contigs by the fraction of positions covered by reads.

use std::collections::HashSet;

use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};

use crate::bam_utils::AlignmentSource;
use crate::error::Result;
use crate::fasta_utils::ReferenceLengths;

pub const DEFAULT_COVERAGE_PERCENT: f64 = 50.0;

/// Whether contigs were screened against alignment evidence.
#[derive(Debug, Clone)]
pub enum CoverageGate {
    /// No alignment source: nothing is a hit, nothing is excluded.
    Unfiltered,
    /// Contigs whose covered fraction met the threshold.
    Hits(HashSet<String>),
}

impl CoverageGate {
    /// True when the contig passed the coverage filter.
    pub fn is_hit(&self, contig: &str) -> bool {
        matches!(self, CoverageGate::Hits(hits) if hits.contains(contig))
    }

    /// True when rows for this contig may contribute to taxonomic classes.
    pub fn admits(&self, contig: &str) -> bool {
        match self {
            CoverageGate::Unfiltered => true,
            CoverageGate::Hits(hits) => hits.contains(contig),
        }
    }

    pub fn hit_count(&self) -> usize {
        match self {
            CoverageGate::Unfiltered => 0,
            CoverageGate::Hits(hits) => hits.len(),
        }
    }
}

/// Collects the references whose covered fraction is at least `threshold_percent`.
///
/// References with no reads are skipped without a pileup. Coverage counts
/// positions with any aligned base, not summed depth.
pub fn filter_references<A, L>(
    alignments: &mut A,
    lengths: &L,
    threshold_percent: f64,
) -> Result<HashSet<String>>
where
    A: AlignmentSource,
    L: ReferenceLengths,
{
    let references = alignments.reference_names();
    let threshold = threshold_percent / 100.0;
    info!(
        "Screening {} references at {}% base coverage",
        references.len(),
        threshold_percent
    );

    let pb = ProgressBar::new(references.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} references screened",
        )
        .map(|style| style.progress_chars("##-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut hits = HashSet::new();
    for reference in references {
        pb.inc(1);
        if alignments.read_count(&reference)? == 0 {
            continue;
        }
        let length = lengths.reference_length(&reference)?;
        if length == 0 {
            warn!("Reference {} has zero length, skipping", reference);
            continue;
        }
        let covered = alignments.covered_positions(&reference)?;
        let base_coverage = covered as f64 / length as f64;
        if base_coverage >= threshold {
            hits.insert(reference);
        }
    }
    pb.finish_and_clear();

    info!("{} references passed the coverage filter", hits.len());
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bam_utils::mock::MockAlignments;
    use crate::error::TraceError;
    use crate::fasta_utils::ReferenceLengthTable;
    use rstest::rstest;

    fn lengths(entries: &[(&str, u64)]) -> ReferenceLengthTable {
        entries.iter().map(|(n, l)| (n.to_string(), *l)).collect()
    }

    #[rstest]
    #[case(50, 50.0, true)]
    #[case(49, 50.0, false)]
    #[case(100, 100.0, true)]
    #[case(1, 0.0, true)]
    #[case(75, 80.0, false)]
    fn test_threshold_boundary(#[case] covered: u64, #[case] threshold: f64, #[case] hit: bool) {
        let mut bam = MockAlignments::default().with("c1", covered, &["r1"]);
        let hits = filter_references(&mut bam, &lengths(&[("c1", 100)]), threshold).unwrap();
        assert_eq!(hits.contains("c1"), hit);
    }

    #[test]
    fn test_zero_reads_excluded_without_pileup() {
        let mut bam = MockAlignments::default()
            .with("empty", 100, &[])
            .with("full", 100, &["r1", "r2"]);
        let hits = filter_references(
            &mut bam,
            &lengths(&[("empty", 100), ("full", 100)]),
            DEFAULT_COVERAGE_PERCENT,
        )
        .unwrap();

        assert_eq!(hits, HashSet::from(["full".to_string()]));
        // read_count only for the empty reference, read_count + pileup for the other
        assert_eq!(bam.fetched, vec!["empty", "full", "full"]);
    }

    #[test]
    fn test_zero_length_reference_skipped() {
        let mut bam = MockAlignments::default().with("c1", 0, &["r1"]);
        let hits = filter_references(&mut bam, &lengths(&[("c1", 0)]), 0.0).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_missing_length_is_error() {
        let mut bam = MockAlignments::default().with("c1", 10, &["r1"]);
        let err = filter_references(&mut bam, &lengths(&[]), 50.0).unwrap_err();
        assert!(matches!(err, TraceError::UnknownReference(name) if name == "c1"));
    }

    #[test]
    fn test_gate_states() {
        let unfiltered = CoverageGate::Unfiltered;
        assert!(!unfiltered.is_hit("c1"));
        assert!(unfiltered.admits("c1"));
        assert_eq!(unfiltered.hit_count(), 0);

        let hits = CoverageGate::Hits(HashSet::from(["c1".to_string()]));
        assert!(hits.is_hit("c1"));
        assert!(!hits.is_hit("c2"));
        assert!(!hits.admits("c2"));
        assert_eq!(hits.hit_count(), 1);
    }
}
