//! ESOM NAMES table parsing.
//!
//! A NAMES file has a header followed by rows of
//! `<point id>\t<sub-sequence id>\t<contig id>`. Each row is one point on the
//! map; a contig split into windows contributes one point per window.

use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use log::{info, warn};

use crate::error::{Result, TraceError};

pub type PointId = u64;

/// Tab-delimited reader shared by every input table: header skipped, no
/// quoting, ragged rows allowed so width can be checked per row.
pub(crate) fn tsv_reader<R: io::Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .trim(Trim::All)
        .from_reader(reader)
}

/// Fails with `MalformedRow` unless `record` has at least `expected` fields.
pub(crate) fn require_columns(record: &StringRecord, expected: usize, source: &Path) -> Result<()> {
    if record.len() < expected {
        return Err(TraceError::MalformedRow {
            path: source.to_path_buf(),
            line: record_line(record),
            expected,
            found: record.len(),
        });
    }
    Ok(())
}

pub(crate) fn record_line(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

/// Contig -> sub-sequence -> point ID, keyed by the composite pair.
#[derive(Debug, Default)]
pub struct NameRegistry {
    points: BTreeMap<(String, String), PointId>,
}

impl NameRegistry {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| TraceError::io(path, e))?;
        let registry = Self::from_reader(file, path)?;
        if registry.is_empty() {
            warn!("No points found in {}", path.display());
        }
        info!(
            "Loaded {} points for {} contigs from {}",
            registry.len(),
            registry.contig_count(),
            path.display()
        );
        Ok(registry)
    }

    /// Parses a NAMES table. `source` is only used in error messages.
    pub fn from_reader<R: io::Read>(reader: R, source: &Path) -> Result<Self> {
        let mut registry = NameRegistry::default();
        for result in tsv_reader(reader).records() {
            let record = result?;
            require_columns(&record, 3, source)?;

            let point_id = record[0].parse::<PointId>().map_err(|_| TraceError::InvalidPointId {
                path: source.to_path_buf(),
                line: record_line(&record),
                value: record[0].to_string(),
            })?;
            let key = (record[2].to_string(), record[1].to_string());
            if let Some(previous) = registry.points.insert(key, point_id) {
                warn!(
                    "Duplicate NAMES entry for contig '{}' sub-sequence '{}' (line {}); point {} replaced by {}",
                    &record[2],
                    &record[1],
                    record_line(&record),
                    previous,
                    point_id
                );
            }
        }
        Ok(registry)
    }

    #[cfg(test)]
    pub fn insert(&mut self, contig: &str, sub_sequence: &str, point: PointId) {
        self.points
            .insert((contig.to_string(), sub_sequence.to_string()), point);
    }

    pub fn contains_contig(&self, contig: &str) -> bool {
        self.points_for(contig).next().is_some()
    }

    /// Point IDs of every sub-sequence of `contig`.
    pub fn points_for<'a>(&'a self, contig: &'a str) -> impl Iterator<Item = PointId> + 'a {
        self.points
            .range((contig.to_string(), String::new())..)
            .take_while(move |((c, _), _)| c == contig)
            .map(|(_, &point)| point)
    }

    /// All `(contig, sub-sequence, point)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, PointId)> {
        self.points
            .iter()
            .map(|((contig, sub), &point)| (contig.as_str(), sub.as_str(), point))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn contig_count(&self) -> usize {
        let mut count = 0;
        let mut last: Option<&str> = None;
        for (contig, _) in self.points.keys() {
            if last != Some(contig.as_str()) {
                count += 1;
                last = Some(contig.as_str());
            }
        }
        count
    }
}
