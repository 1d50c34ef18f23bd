//! Class assignment of ESOM points from coverage hits or taxonomy rows.

use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::Path;

use indexmap::IndexMap;
use log::{debug, info};

use crate::coverage::CoverageGate;
use crate::error::{Result, TraceError};
use crate::names::{require_columns, tsv_reader, NameRegistry, PointId};
use crate::palette::Palette;

const TAXONOMY_CONTIG_COLUMN: usize = 0;
const TAXONOMY_RANK_COLUMN: usize = 3;
const TAXONOMY_NAME_COLUMN: usize = 4;

/// Taxon name -> class index, in first-seen order starting at 1.
#[derive(Debug, Default, Clone)]
pub struct TaxonIndex {
    classes: IndexMap<String, usize>,
}

impl TaxonIndex {
    /// Returns the class of `taxon`, allocating the next index on first sight.
    pub fn class_of(&mut self, taxon: &str) -> usize {
        if let Some(&class) = self.classes.get(taxon) {
            return class;
        }
        let class = self.classes.len() + 1;
        self.classes.insert(taxon.to_string(), class);
        class
    }

    /// `(class, taxon)` pairs by ascending class.
    pub fn legend(&self) -> impl Iterator<Item = (usize, &str)> {
        self.classes.iter().map(|(taxon, &class)| (class, taxon.as_str()))
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Point classes, palette and optional taxon legend for one run.
#[derive(Debug, Clone)]
pub struct ClassAssignment {
    pub classes: BTreeMap<PointId, usize>,
    pub palette: Palette,
    pub taxa: Option<TaxonIndex>,
}

/// Class 1 for every point of a contig that passed the coverage filter, else 0.
pub fn assign_binary(names: &NameRegistry, gate: &CoverageGate) -> ClassAssignment {
    let classes = names
        .iter()
        .map(|(contig, _, point)| (point, usize::from(gate.is_hit(contig))))
        .collect();
    ClassAssignment {
        classes,
        palette: Palette::binary(),
        taxa: None,
    }
}

pub fn assign_taxonomic_from_path(
    names: &NameRegistry,
    gate: &CoverageGate,
    taxonomy_path: &Path,
    rank: &str,
) -> Result<ClassAssignment> {
    let file = File::open(taxonomy_path).map_err(|e| TraceError::io(taxonomy_path, e))?;
    assign_taxonomic(names, gate, file, taxonomy_path, rank)
}

/// Classes from a taxonomy summary table at the requested rank.
///
/// A row counts when its contig is in `names`, is admitted by `gate` and its
/// rank equals `rank` after Unicode lowercasing both. Later rows for a contig overwrite the
/// class set by earlier ones. Points never matched stay in class 0.
pub fn assign_taxonomic<R: io::Read>(
    names: &NameRegistry,
    gate: &CoverageGate,
    taxonomy: R,
    source: &Path,
    rank: &str,
) -> Result<ClassAssignment> {
    let mut taxa = TaxonIndex::default();
    let mut classes: BTreeMap<PointId, usize> = BTreeMap::new();
    let mut matched_rows = 0usize;
    let rank = rank.to_lowercase();

    for result in tsv_reader(taxonomy).records() {
        let record = result?;
        require_columns(&record, TAXONOMY_NAME_COLUMN + 1, source)?;

        let contig = &record[TAXONOMY_CONTIG_COLUMN];
        if !names.contains_contig(contig)
            || !gate.admits(contig)
            || record[TAXONOMY_RANK_COLUMN].to_lowercase() != rank
        {
            continue;
        }

        matched_rows += 1;
        let class = taxa.class_of(&record[TAXONOMY_NAME_COLUMN]);
        for point in names.points_for(contig) {
            classes.insert(point, class);
        }
    }
    debug!("{} taxonomy rows matched rank '{}'", matched_rows, rank);

    for (_, _, point) in names.iter() {
        classes.entry(point).or_insert(0);
    }

    info!(
        "Found {} taxa at rank '{}' across {} points",
        taxa.len(),
        rank,
        classes.len()
    );

    Ok(ClassAssignment {
        classes,
        palette: Palette::rainbow(taxa.len() + 1),
        taxa: Some(taxa),
    })
}
