use log::{debug, info};
use rust_htslib::bam::{self, Read as BamRead};
use std::path::Path;

use crate::error::{Result, TraceError};
use crate::fasta_utils::ReferenceLengthTable;

/// Alignment evidence keyed by reference name.
pub trait AlignmentSource {
    /// Reference names in header order.
    fn reference_names(&self) -> Vec<String>;

    /// Number of alignment records placed on `reference`.
    fn read_count(&mut self, reference: &str) -> Result<u64>;

    /// Number of reference positions with at least one aligned base (pileup columns).
    fn covered_positions(&mut self, reference: &str) -> Result<u64>;

    /// Query names of the records placed on `reference`, in alignment order.
    fn query_names(&mut self, reference: &str) -> Result<Vec<String>>;
}

/// Indexed BAM file (requires a `.bai`/`.csi` beside it).
pub struct BamAlignments {
    reader: bam::IndexedReader,
}

impl BamAlignments {
    pub fn open(bam_path: &Path) -> Result<Self> {
        let reader = bam::IndexedReader::from_path(bam_path)?;
        info!(
            "Opened BAM file {} ({} references)",
            bam_path.display(),
            reader.header().target_count()
        );
        Ok(BamAlignments { reader })
    }

    /// Reference lengths as recorded in the BAM header.
    pub fn header_lengths(&self) -> ReferenceLengthTable {
        let header = self.reader.header();
        header
            .target_names()
            .iter()
            .enumerate()
            .map(|(tid, name)| {
                let length = header.target_len(tid as u32).unwrap_or(0);
                (String::from_utf8_lossy(name).into_owned(), length)
            })
            .collect()
    }

    fn fetch_reference(&mut self, reference: &str) -> Result<()> {
        let tid = self
            .reader
            .header()
            .tid(reference.as_bytes())
            .ok_or_else(|| TraceError::UnknownReference(reference.to_string()))?;
        self.reader.fetch(tid as i32)?;
        Ok(())
    }
}

impl AlignmentSource for BamAlignments {
    fn reference_names(&self) -> Vec<String> {
        self.reader
            .header()
            .target_names()
            .iter()
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .collect()
    }

    fn read_count(&mut self, reference: &str) -> Result<u64> {
        self.fetch_reference(reference)?;
        let mut count = 0;
        for record in self.reader.records() {
            record?;
            count += 1;
        }
        Ok(count)
    }

    fn covered_positions(&mut self, reference: &str) -> Result<u64> {
        self.fetch_reference(reference)?;
        let mut columns = 0;
        for pileup in self.reader.pileup() {
            pileup?;
            columns += 1;
        }
        debug!("{}: {} covered positions", reference, columns);
        Ok(columns)
    }

    fn query_names(&mut self, reference: &str) -> Result<Vec<String>> {
        self.fetch_reference(reference)?;
        let mut names = Vec::new();
        for record in self.reader.records() {
            let record = record?;
            names.push(String::from_utf8_lossy(record.qname()).into_owned());
        }
        Ok(names)
    }
}
