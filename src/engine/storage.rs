use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::DbResult;

/// Field delimiter used in every segment file.
pub const DELIMITER: char = ',';

/// Manages the on-disk segment files for a single table.
///
/// A table's rows are spread across numbered CSV files inside the table
/// directory. Every segment starts with a header line naming the primary key
/// column and the table's columns; data lines follow in insertion order.
///
/// ## Directory Layout
/// ```text
/// <schema>/<table>/
///   1.csv                 ← header + up to `row_cap` data rows
///   2.csv                 ← created once 1.csv is full
///   <table>_pk_sequence   ← next primary key to hand out
/// ```
///
/// ## Capping
/// A segment is full once it holds `row_cap` data rows. Full segments are never
/// appended to again; the next insert opens the next index instead.
///
/// ## Delimiters
/// Values are written verbatim. A value containing the delimiter shifts every
/// following field of its row.
#[derive(Clone, Debug)]
pub struct SegmentStore {
    /// Table directory holding the segment files
    dir: PathBuf,
    /// Table name (used for the header and the pk sequence file)
    table: String,
    /// Column names written into new headers
    columns: Vec<String>,
    /// Maximum number of data rows per segment
    row_cap: usize,
}

impl SegmentStore {
    /// Opens the segment store for a table, creating its directory if needed.
    ///
    /// ## Arguments
    /// * `dir` - Table directory (e.g. `shop/users`)
    /// * `table` - Table name
    /// * `columns` - Ordered column names, excluding the primary key
    /// * `row_cap` - Data rows per segment before overflowing into the next one
    pub fn open(dir: PathBuf, table: &str, columns: Vec<String>, row_cap: usize) -> DbResult<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            table: table.to_string(),
            columns,
            row_cap,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn row_cap(&self) -> usize {
        self.row_cap
    }

    /// Path of the segment with the given 1-based index.
    pub fn segment_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}.csv", index))
    }

    /// Header line for segments created from now on.
    pub fn header(&self) -> String {
        let mut line = format!("{}_pk", self.table);
        for column in &self.columns {
            line.push(DELIMITER);
            line.push_str(column);
        }
        line
    }

    /// Number of data rows in a segment file (lines minus the header).
    ///
    /// A missing or empty file holds no rows.
    pub fn row_count(&self, path: &Path) -> DbResult<usize> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut lines = 0usize;
        for line in BufReader::new(file).lines() {
            line?;
            lines += 1;
        }
        Ok(lines.saturating_sub(1))
    }

    /// Finds the segment the next row should be written to.
    ///
    /// Indices are scanned from 1. The first missing file ends the scan and is
    /// returned as a fresh segment; otherwise the first existing segment below
    /// the row cap wins. Nothing is created here.
    pub fn next_writable_segment(&self) -> DbResult<PathBuf> {
        let mut index = 1;
        loop {
            let path = self.segment_path(index);
            if !path.exists() {
                return Ok(path);
            }
            if self.row_count(&path)? < self.row_cap {
                return Ok(path);
            }
            index += 1;
        }
    }

    /// All existing segments in index order.
    pub fn segments(&self) -> Vec<PathBuf> {
        (1..)
            .map(|index| self.segment_path(index))
            .take_while(|path| path.exists())
            .collect()
    }

    /// Appends one data row, writing the header first when the segment is new.
    pub fn append_row(&self, path: &Path, pk: u64, values: &[String]) -> DbResult<()> {
        let is_empty = match fs::metadata(path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut out = BufWriter::new(file);
        if is_empty {
            writeln!(out, "{}", self.header())?;
        }

        let mut line = pk.to_string();
        for value in values {
            line.push(DELIMITER);
            line.push_str(value);
        }
        writeln!(out, "{}", line)?;
        out.flush()?;

        debug!(table = %self.table, segment = %path.display(), pk, "row appended");
        Ok(())
    }

    /// Data rows of a segment, header skipped. A missing segment is empty.
    pub fn read_rows(&self, path: &Path) -> DbResult<Vec<String>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut rows = Vec::new();
        for line in BufReader::new(file).lines().skip(1) {
            let line = line?;
            if !line.is_empty() {
                rows.push(line);
            }
        }
        Ok(rows)
    }

    /// Rewrites a segment without the rows for which `exclude` returns true.
    ///
    /// The header and surviving rows are copied to a temporary file in the
    /// table directory which then replaces the segment. If `exclude` fails, the
    /// temporary file is dropped and the segment is left as it was.
    ///
    /// ## Returns
    /// * `Ok(n)` - Number of rows removed (0 for a missing segment)
    /// * `Err(_)` - I/O error or an error raised by `exclude`
    pub fn rewrite_excluding<F>(&self, path: &Path, mut exclude: F) -> DbResult<usize>
    where
        F: FnMut(&str) -> DbResult<bool>,
    {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        // The replacement keeps the segment's mode, not the temp file's 0600.
        tmp.as_file().set_permissions(file.metadata()?.permissions())?;
        let mut removed = 0usize;
        {
            let mut out = BufWriter::new(&mut tmp);
            let mut lines = BufReader::new(file).lines();
            if let Some(header) = lines.next() {
                writeln!(out, "{}", header?)?;
            }
            for line in lines {
                let line = line?;
                if line.is_empty() {
                    continue;
                }
                if exclude(&line)? {
                    debug!(table = %self.table, row = %line, "row removed");
                    removed += 1;
                } else {
                    writeln!(out, "{}", line)?;
                }
            }
            out.flush()?;
        }

        tmp.persist(path).map_err(|e| e.error)?;
        Ok(removed)
    }

    fn pk_sequence_path(&self) -> PathBuf {
        self.dir.join(format!("{}_pk_sequence", self.table))
    }

    /// Reads the persisted primary-key counter, if any.
    pub fn load_pk_sequence(&self) -> DbResult<Option<u64>> {
        let text = match fs::read_to_string(self.pk_sequence_path()) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let value = text.trim().parse::<u64>().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("corrupt pk sequence for {}: {}", self.table, e),
            )
        })?;
        Ok(Some(value))
    }

    /// Overwrites the persisted primary-key counter.
    pub fn store_pk_sequence(&self, value: u64) -> DbResult<()> {
        fs::write(self.pk_sequence_path(), value.to_string())?;
        Ok(())
    }
}
