//! ESOM `.cls` and taxon legend writers.

use std::collections::BTreeMap;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::classes::{ClassAssignment, TaxonIndex};
use crate::error::{Result, TraceError};
use crate::names::PointId;
use crate::palette::Palette;

pub const CLASS_SUFFIX: &str = ".cls";
pub const LEGEND_SUFFIX: &str = ".taxa";

#[derive(Serialize)]
struct LegendRow<'a> {
    #[serde(rename = "Class")]
    class: usize,
    #[serde(rename = "Taxonomy")]
    taxon: &'a str,
}

/// `<base><suffix>`, keeping whatever extension `base` already has.
pub fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

pub fn write_class_file<W: Write>(
    out: W,
    hit_count: usize,
    palette: &Palette,
    classes: &BTreeMap<PointId, usize>,
) -> io::Result<()> {
    let mut out = BufWriter::new(out);
    writeln!(out, "% {}", hit_count)?;
    for entry in palette.iter() {
        let [r, g, b] = entry.rgb;
        writeln!(out, "%{} {}\t{}\t{}", entry.class, r, g, b)?;
    }
    for (point, class) in classes {
        writeln!(out, "{}\t{}", point, class)?;
    }
    out.flush()
}

/// `path` names `out` in errors.
pub fn write_taxon_legend<W: Write>(out: W, taxa: &TaxonIndex, path: &Path) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(out);
    for (class, taxon) in taxa.legend() {
        writer.serialize(LegendRow { class, taxon })?;
    }
    if taxa.is_empty() {
        writer.write_record(["Class", "Taxonomy"])?;
    }
    writer
        .flush()
        .map_err(|e| TraceError::io(path, e))
}

/// A fully written temporary file waiting to be renamed to `path`.
/// Dropping it uncommitted removes the temporary file.
pub struct StagedFile {
    temp: NamedTempFile,
    path: PathBuf,
}

impl StagedFile {
    pub fn commit(self) -> Result<PathBuf> {
        let StagedFile { temp, path } = self;
        temp.persist(&path)
            .map_err(|e| TraceError::io(&path, e.error))?;
        Ok(path)
    }
}

/// Writes a temporary file beside `path` without touching `path` itself.
pub fn stage<F>(path: &Path, write: F) -> Result<StagedFile>
where
    F: FnOnce(&mut NamedTempFile) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir).map_err(|e| TraceError::io(dir, e))?;
    write(&mut temp)?;
    Ok(StagedFile {
        temp,
        path: path.to_path_buf(),
    })
}

/// Writes through a temporary file beside `path` and renames it into place.
pub fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut NamedTempFile) -> Result<()>,
{
    stage(path, write)?.commit().map(|_| ())
}

/// Writes `<base>.cls` and, in taxonomic mode, `<base>.taxa`. Both files are
/// fully written before either is renamed into place.
pub fn write_classification(
    base: &Path,
    hit_count: usize,
    assignment: &ClassAssignment,
) -> Result<(PathBuf, Option<PathBuf>)> {
    let class_path = with_suffix(base, CLASS_SUFFIX);
    let class_file = stage(&class_path, |file| {
        write_class_file(file, hit_count, &assignment.palette, &assignment.classes)
            .map_err(|e| TraceError::io(&class_path, e))
    })?;
    let legend_file = match &assignment.taxa {
        Some(taxa) => {
            let legend_path = with_suffix(base, LEGEND_SUFFIX);
            Some(stage(&legend_path, |file| {
                write_taxon_legend(file, taxa, &legend_path)
            })?)
        }
        None => None,
    };

    let class_path = class_file.commit()?;
    let legend_path = legend_file.map(StagedFile::commit).transpose()?;
    Ok((class_path, legend_path))
}
