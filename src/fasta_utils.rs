use bio::io::fasta;
use log::info;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{Result, TraceError};

/// Lookup from reference name to full sequence length.
pub trait ReferenceLengths {
    fn reference_length(&self, reference: &str) -> Result<u64>;
}

#[derive(Debug, Default, Clone)]
pub struct ReferenceLengthTable {
    lengths: HashMap<String, u64>,
}

impl ReferenceLengthTable {
    /// Reads lengths from `<fasta>.fai` when it exists, otherwise scans the FASTA.
    pub fn from_fasta(fasta_path: &Path) -> Result<Self> {
        let fai_path = fai_path(fasta_path);
        let table = if fai_path.exists() {
            let index = fasta::Index::from_file(&fai_path).map_err(|e| TraceError::FastaIndex {
                path: fai_path.clone(),
                message: e.to_string(),
            })?;
            index
                .sequences()
                .into_iter()
                .map(|sequence| (sequence.name, sequence.len))
                .collect()
        } else {
            info!(
                "No index found for {}, scanning sequences for lengths",
                fasta_path.display()
            );
            Self::scan_fasta(fasta_path)?
        };
        info!(
            "Loaded {} reference lengths from {}",
            table.len(),
            fasta_path.display()
        );
        Ok(table)
    }

    fn scan_fasta(fasta_path: &Path) -> Result<Self> {
        let file = File::open(fasta_path).map_err(|e| TraceError::io(fasta_path, e))?;
        let mut table = ReferenceLengthTable::default();
        for record in fasta::Reader::new(file).records() {
            let record = record.map_err(|e| TraceError::io(fasta_path, e))?;
            table
                .lengths
                .insert(record.id().to_string(), record.seq().len() as u64);
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.lengths.len()
    }
}

impl FromIterator<(String, u64)> for ReferenceLengthTable {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        ReferenceLengthTable {
            lengths: iter.into_iter().collect(),
        }
    }
}

impl ReferenceLengths for ReferenceLengthTable {
    fn reference_length(&self, reference: &str) -> Result<u64> {
        self.lengths
            .get(reference)
            .copied()
            .ok_or_else(|| TraceError::UnknownReference(reference.to_string()))
    }
}

fn fai_path(fasta_path: &Path) -> PathBuf {
    let mut name = fasta_path.as_os_str().to_owned();
    name.push(".fai");
    PathBuf::from(name)
}

/// Lazily yields the record identifiers of a FASTA file, in file order.
pub fn sequence_ids(fasta_path: &Path) -> Result<impl Iterator<Item = Result<String>>> {
    let file = File::open(fasta_path).map_err(|e| TraceError::io(fasta_path, e))?;
    let path = fasta_path.to_path_buf();
    Ok(fasta::Reader::new(file).records().map(move |record| {
        record
            .map(|r| r.id().to_string())
            .map_err(|e| TraceError::io(&path, e))
    }))
}
