//! Byte-offset index over a per-read taxonomy summary.
//!
//! The table is scanned once; lookups seek back into the open stream and
//! re-read single lines instead of keeping parsed rows in memory.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{Result, TraceError};

pub struct TaxonomyOffsetIndex<R> {
    stream: R,
    source: PathBuf,
    offsets: HashMap<String, Vec<u64>>,
    line_buf: Vec<u8>,
}

impl TaxonomyOffsetIndex<BufReader<File>> {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| TraceError::io(path, e))?;
        let index = Self::build(BufReader::new(file), path)?;
        info!(
            "Indexed {} records for {} reads in {}",
            index.record_count(),
            index.read_count(),
            path.display()
        );
        Ok(index)
    }
}

impl<R: BufRead + Seek> TaxonomyOffsetIndex<R> {
    /// Skips the header line, then records where every following line starts,
    /// keyed by the first token of its first column. Lines are kept as raw
    /// bytes; `source` names the stream in errors.
    pub fn build(mut stream: R, source: &Path) -> Result<Self> {
        let mut offsets: HashMap<String, Vec<u64>> = HashMap::new();
        let mut line = Vec::new();
        let read_err = |e| TraceError::io(source, e);

        let mut position = stream.read_until(b'\n', &mut line).map_err(read_err)? as u64;
        loop {
            line.clear();
            let read = stream.read_until(b'\n', &mut line).map_err(read_err)?;
            if read == 0 {
                break;
            }
            if let Some(read_id) = read_id(&line) {
                offsets
                    .entry(String::from_utf8_lossy(read_id).into_owned())
                    .or_default()
                    .push(position);
            }
            position += read as u64;
        }

        Ok(TaxonomyOffsetIndex {
            stream,
            source: source.to_path_buf(),
            offsets,
            line_buf: Vec::new(),
        })
    }

    pub fn contains(&self, read_id: &str) -> bool {
        self.offsets.contains_key(read_id)
    }

    #[cfg(test)]
    /// Offsets of the records for `read_id`, in file order.
    pub fn offsets(&self, read_id: &str) -> Option<&[u64]> {
        self.offsets.get(read_id).map(Vec::as_slice)
    }

    /// Copies every record for `read_id` byte for byte into `out`; returns the
    /// line count. `out_path` names the destination in errors.
    ///
    /// Unknown reads copy nothing.
    pub fn copy_records<W: Write>(
        &mut self,
        read_id: &str,
        out: &mut W,
        out_path: &Path,
    ) -> Result<usize> {
        let Some(offsets) = self.offsets.get(read_id) else {
            return Ok(0);
        };
        let write_err = |e| TraceError::io(out_path, e);
        for &offset in offsets {
            self.line_buf.clear();
            self.stream
                .seek(SeekFrom::Start(offset))
                .and_then(|_| self.stream.read_until(b'\n', &mut self.line_buf))
                .map_err(|e| TraceError::io(&self.source, e))?;
            out.write_all(&self.line_buf).map_err(write_err)?;
            if self.line_buf.last() != Some(&b'\n') {
                out.write_all(b"\n").map_err(write_err)?;
            }
        }
        Ok(offsets.len())
    }

    pub fn read_count(&self) -> usize {
        self.offsets.len()
    }

    pub fn record_count(&self) -> usize {
        self.offsets.values().map(Vec::len).sum()
    }
}

/// First ASCII-whitespace-delimited token of the first tab-delimited column.
fn read_id(line: &[u8]) -> Option<&[u8]> {
    line.split(|&b| b == b'\t')
        .next()?
        .split(|b| b.is_ascii_whitespace())
        .find(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn out_path() -> &'static Path {
        Path::new("out.txt")
    }

    const TABLE: &str = "#Sequence_ID\tHit_Coordinates\tNCBI_Taxon_ID\tTaxon_Rank\tTaxon_Name\n\
        r1 extra\t1..50\t1\tgenus\tFoo\n\
        r2\t3..40\t2\tgenus\tBar\n\
        r1\t1..50\t10\tfamily\tFooaceae\n\
        \n\
        r3\t9..90\t3\tspecies\tBaz qux";

    fn index() -> TaxonomyOffsetIndex<Cursor<Vec<u8>>> {
        TaxonomyOffsetIndex::build(Cursor::new(TABLE.as_bytes().to_vec()), Path::new("taxa.txt"))
            .unwrap()
    }

    #[test]
    fn test_offsets_in_file_order() {
        let index = index();
        assert_eq!(index.read_count(), 3);
        assert_eq!(index.record_count(), 4);
        let r1 = index.offsets("r1").unwrap();
        assert_eq!(r1.len(), 2);
        assert!(r1[0] < r1[1]);
        assert!(!index.contains("#Sequence_ID"));
        assert!(!index.contains(""));
    }

    #[test]
    fn test_offsets_point_at_their_lines() {
        let mut index = index();
        for read in ["r1", "r2", "r3"] {
            let offsets = index.offsets(read).unwrap().to_vec();
            for offset in offsets {
                index.stream.seek(SeekFrom::Start(offset)).unwrap();
                let mut line = Vec::new();
                index.stream.read_until(b'\n', &mut line).unwrap();
                assert_eq!(read_id(&line), Some(read.as_bytes()));
            }
        }
    }

    #[test]
    fn test_copy_records_verbatim() {
        let mut index = index();
        let mut out = Vec::new();
        assert_eq!(index.copy_records("r1", &mut out, out_path()).unwrap(), 2);
        assert_eq!(index.copy_records("r3", &mut out, out_path()).unwrap(), 1);
        assert_eq!(index.copy_records("missing", &mut out, out_path()).unwrap(), 0);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "r1 extra\t1..50\t1\tgenus\tFoo\n\
             r1\t1..50\t10\tfamily\tFooaceae\n\
             r3\t9..90\t3\tspecies\tBaz qux\n"
        );
    }

    #[test]
    fn test_repeated_lookups() {
        let mut index = index();
        let mut first = Vec::new();
        let mut second = Vec::new();
        index.copy_records("r2", &mut first, out_path()).unwrap();
        index.copy_records("r1", &mut Vec::new(), out_path()).unwrap();
        index.copy_records("r2", &mut second, out_path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_stream() {
        let index = TaxonomyOffsetIndex::build(Cursor::new(Vec::new()), Path::new("empty.txt")).unwrap();
        assert_eq!(index.read_count(), 0);
    }

    #[test]
    fn test_read_id_tokens() {
        assert_eq!(read_id(b"abc def\tx"), Some(&b"abc"[..]));
        assert_eq!(read_id(b"abc\tx y"), Some(&b"abc"[..]));
        assert_eq!(read_id(b"  abc\tx"), Some(&b"abc"[..]));
        assert_eq!(read_id(b"\n"), None);
    }

    #[test]
    fn test_latin1_line_copied_byte_for_byte() {
        let table = b"#h\nr1\tx\t1\tgenus\tCaf\xe9\nr2\tx\t2\tgenus\tBar\n".to_vec();
        let mut index = TaxonomyOffsetIndex::build(Cursor::new(table), Path::new("taxa.txt")).unwrap();
        assert_eq!(index.read_count(), 2);

        let mut out = Vec::new();
        assert_eq!(index.copy_records("r1", &mut out, out_path()).unwrap(), 1);
        assert_eq!(out, b"r1\tx\t1\tgenus\tCaf\xe9\n".to_vec());
    }

    #[test]
    fn test_non_utf8_read_id_is_keyed_lossily() {
        let table = b"#h\nr\xff1\tx\n".to_vec();
        let index = TaxonomyOffsetIndex::build(Cursor::new(table), Path::new("taxa.txt")).unwrap();
        assert!(index.contains("r\u{fffd}1"));
    }

    #[test]
    fn test_write_failure_names_destination() {
        struct Full;
        impl Write for Full {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut index = index();
        let err = index.copy_records("r2", &mut Full, Path::new("bin1.taxa_summary.txt")).unwrap_err();
        assert!(matches!(err, TraceError::Io { path, .. } if path == Path::new("bin1.taxa_summary.txt")));
    }

    #[test]
    fn test_read_failure_names_taxonomy_file() {
        struct Unreadable;
        impl std::io::Read for Unreadable {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "bad sector"))
            }
        }
        impl Seek for Unreadable {
            fn seek(&mut self, _: SeekFrom) -> std::io::Result<u64> {
                Ok(0)
            }
        }

        let err = TaxonomyOffsetIndex::build(BufReader::new(Unreadable), Path::new("taxa.txt"))
            .err()
            .unwrap();
        assert!(matches!(err, TraceError::Io { path, .. } if path == Path::new("taxa.txt")));
    }
}
