//! Per-bin extraction of read-level taxonomy records.

use std::collections::HashSet;
use std::fs;
use std::io::{BufRead, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};

use crate::bam_utils::AlignmentSource;
use crate::class_file::write_atomically;
use crate::error::{Result, TraceError};
use crate::fasta_utils::sequence_ids;
use crate::taxa_index::TaxonomyOffsetIndex;

pub const SUMMARY_SUFFIX: &str = ".taxa_summary.txt";
pub const SUMMARY_HEADER: &str = "#Sequence_ID\tHit_Coordinates\tNCBI_Taxon_ID\tTaxon_Rank\tTaxon_Name\tCumulative_Probability_Mass\tMarkers_Hit";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BinReport {
    pub sequences: usize,
    pub duplicates: usize,
    pub reads: usize,
    pub untaxed_reads: usize,
    pub lines: usize,
}

/// `<output_dir>/<bin file name>.taxa_summary.txt`
pub fn summary_path(bin: &Path, output_dir: &Path) -> PathBuf {
    let name = bin
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bin".to_string());
    output_dir.join(format!("{}{}", name, SUMMARY_SUFFIX))
}

/// Streams the taxonomy lines of every read aligned to the bin's sequences.
///
/// A sequence ID seen earlier in the same bin is skipped. Reads without a
/// taxonomy record are ignored. `out_path` names `out` in errors.
pub fn extract_bin<A, R, W, I>(
    sequence_ids: I,
    alignments: &mut A,
    index: &mut TaxonomyOffsetIndex<R>,
    out: W,
    out_path: &Path,
) -> Result<BinReport>
where
    A: AlignmentSource,
    R: BufRead + Seek,
    W: Write,
    I: IntoIterator<Item = Result<String>>,
{
    let mut out = BufWriter::new(out);
    let mut report = BinReport::default();
    let mut seen: HashSet<String> = HashSet::new();
    let write_err = |e| TraceError::io(out_path, e);

    writeln!(out, "{}", SUMMARY_HEADER).map_err(write_err)?;
    for id in sequence_ids {
        let id = id?;
        if !seen.insert(id.clone()) {
            debug!("Sequence {} repeated in bin, skipping", id);
            report.duplicates += 1;
            continue;
        }
        report.sequences += 1;
        for query in alignments.query_names(&id)? {
            report.reads += 1;
            if !index.contains(&query) {
                report.untaxed_reads += 1;
                continue;
            }
            report.lines += index.copy_records(&query, &mut out, out_path)?;
        }
    }
    out.flush().map_err(write_err)?;
    Ok(report)
}

/// Extracts every bin into `output_dir`, in the order given.
pub fn extract_bins<A, R>(
    bins: &[PathBuf],
    output_dir: &Path,
    alignments: &mut A,
    index: &mut TaxonomyOffsetIndex<R>,
) -> Result<Vec<(PathBuf, BinReport)>>
where
    A: AlignmentSource,
    R: BufRead + Seek,
{
    fs::create_dir_all(output_dir).map_err(|e| TraceError::io(output_dir, e))?;

    let pb = ProgressBar::new(bins.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} bins")
            .map(|style| style.progress_chars("##-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut reports = Vec::with_capacity(bins.len());
    for bin in bins {
        let out_path = summary_path(bin, output_dir);
        let mut report = BinReport::default();
        write_atomically(&out_path, |file| {
            report = extract_bin(sequence_ids(bin)?, alignments, index, file, &out_path)?;
            Ok(())
        })?;
        info!(
            "{}: {} sequences, {} reads, {} taxonomy lines -> {}",
            bin.display(),
            report.sequences,
            report.reads,
            report.lines,
            out_path.display()
        );
        debug!(
            "{}: {} repeated sequences, {} reads without taxonomy",
            bin.display(),
            report.duplicates,
            report.untaxed_reads
        );
        reports.push((out_path, report));
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bam_utils::mock::MockAlignments;
    use std::io::{self, Cursor};

    fn out_path() -> &'static Path {
        Path::new("bin.taxa_summary.txt")
    }

    const TAXONOMY: &str = "#header\n\
        readA\tx\t1\tgenus\tFoo\t0.9\t2\n\
        readB\tx\t2\tgenus\tBar\t0.8\t1\n\
        readA\tx\t3\tfamily\tFooaceae\t1.0\t2\n";

    fn index() -> TaxonomyOffsetIndex<Cursor<Vec<u8>>> {
        TaxonomyOffsetIndex::build(Cursor::new(TAXONOMY.as_bytes().to_vec()), Path::new("taxa.txt"))
            .unwrap()
    }

    fn ids(names: &[&str]) -> Vec<Result<String>> {
        names.iter().map(|n| Ok(n.to_string())).collect()
    }

    #[test]
    fn test_duplicate_sequences_queried_once() {
        let mut bam = MockAlignments::default()
            .with("s1", 0, &["readA", "readX"])
            .with("s2", 0, &["readB"]);
        let mut index = index();
        let mut out = Vec::new();

        let report = extract_bin(ids(&["s1", "s1", "s2"]), &mut bam, &mut index, &mut out, out_path()).unwrap();

        assert_eq!(bam.fetched, vec!["s1", "s2"]);
        assert_eq!(
            report,
            BinReport { sequences: 2, duplicates: 1, reads: 3, untaxed_reads: 1, lines: 3 }
        );
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!(
                "{SUMMARY_HEADER}\n\
                 readA\tx\t1\tgenus\tFoo\t0.9\t2\n\
                 readA\tx\t3\tfamily\tFooaceae\t1.0\t2\n\
                 readB\tx\t2\tgenus\tBar\t0.8\t1\n"
            )
        );
    }

    #[test]
    fn test_empty_bin_has_header_only() {
        let mut bam = MockAlignments::default();
        let mut out = Vec::new();
        extract_bin(ids(&[]), &mut bam, &mut index(), &mut out, out_path()).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), format!("{SUMMARY_HEADER}\n"));
    }

    #[test]
    fn test_unknown_sequence_is_error() {
        let mut bam = MockAlignments::default();
        let err = extract_bin(ids(&["ghost"]), &mut bam, &mut index(), Vec::new(), out_path()).unwrap_err();
        assert!(matches!(err, TraceError::UnknownReference(_)));
    }

    #[test]
    fn test_extract_bins_writes_one_file_per_bin() {
        let dir = tempfile::tempdir().unwrap();
        let bin1 = dir.path().join("bin1.fasta");
        let bin2 = dir.path().join("bin2.fa");
        fs::write(&bin1, ">s1\nACGT\n>s1\nACGT\n").unwrap();
        fs::write(&bin2, ">s2\nGG\n").unwrap();
        let out_dir = dir.path().join("out");

        let mut bam = MockAlignments::default()
            .with("s1", 0, &["readA"])
            .with("s2", 0, &["readB", "readA"]);
        let reports =
            extract_bins(&[bin1, bin2], &out_dir, &mut bam, &mut index()).unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].0, out_dir.join("bin1.fasta.taxa_summary.txt"));
        assert_eq!(reports[0].1.lines, 2);
        assert_eq!(reports[1].1.lines, 3);

        let second = fs::read_to_string(out_dir.join("bin2.fa.taxa_summary.txt")).unwrap();
        let body: Vec<&str> = second.lines().skip(1).collect();
        assert_eq!(
            body,
            vec![
                "readB\tx\t2\tgenus\tBar\t0.8\t1",
                "readA\tx\t1\tgenus\tFoo\t0.9\t2",
                "readA\tx\t3\tfamily\tFooaceae\t1.0\t2",
            ]
        );
    }

    #[test]
    fn test_missing_bin_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("out");
        let missing = dir.path().join("missing.fasta");
        let mut bam = MockAlignments::default();

        let err = extract_bins(&[missing.clone()], &out_dir, &mut bam, &mut index()).unwrap_err();
        assert!(matches!(err, TraceError::Io { .. }));
        assert!(!summary_path(&missing, &out_dir).exists());
    }

    struct Unwritable;

    impl Write for Unwritable {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "no space left"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_names_summary_file() {
        let mut bam = MockAlignments::default().with("s1", 0, &["readA"]);
        let err = extract_bin(ids(&["s1"]), &mut bam, &mut index(), Unwritable, out_path()).unwrap_err();
        assert!(matches!(err, TraceError::Io { path, .. } if path == out_path()));
    }
}
