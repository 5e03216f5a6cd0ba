//! Numeric table archiving
//!
//! Tables are written one row per line with whitespace delimited columns and
//! no header, so they can be read back by this module or by any tool that
//! understands plain numeric text tables.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use std::fs::File;
use std::path::{Path, PathBuf};
use csv::{ReaderBuilder, Trim, Writer, WriterBuilder};
use log::debug;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Column delimiter used in all archived tables.
const DELIMITER: u8 = b' ';

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An object used to write numeric table archive files.
pub struct Archiver {
    path: PathBuf,
    writer: Writer<File>,
    num_rows: usize,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors that can occur while writing or reading an archived table.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Cannot create the archive file {0:?}: {1}")]
    CannotCreate(PathBuf, std::io::Error),

    #[error("Cannot open the archive file {0:?}: {1}")]
    CannotOpen(PathBuf, csv::Error),

    #[error("Cannot write row {1} of {0:?}: {2}")]
    CannotWrite(PathBuf, usize, csv::Error),

    #[error("Cannot flush {0:?}: {1}")]
    CannotFlush(PathBuf, std::io::Error),

    #[error("Cannot read row {1} of {0:?}: {2}")]
    CannotRead(PathBuf, usize, csv::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Archiver {
    /// Create a new archiver from a paricular path relative to the given root
    /// directory. Any existing file is truncated.
    pub fn from_path<R: AsRef<Path>, P: AsRef<Path>>(
        root: R, path: P
    ) -> Result<Self, ArchiveError> {
        let full_path = root.as_ref().join(path);

        let file = File::create(&full_path)
            .map_err(|e| ArchiveError::CannotCreate(full_path.clone(), e))?;

        let writer = WriterBuilder::new()
            .has_headers(false)
            .delimiter(DELIMITER)
            .from_writer(file);

        Ok(Self {
            path: full_path,
            writer,
            num_rows: 0
        })
    }

    /// Serialise one row into the archive.
    ///
    /// All rows of a table must have the same number of columns.
    pub fn write_row(&mut self, row: &[f64]) -> Result<(), ArchiveError> {
        self.writer.serialize(row)
            .map_err(|e| ArchiveError::CannotWrite(self.path.clone(), self.num_rows, e))?;
        self.num_rows += 1;

        Ok(())
    }

    /// Flush the archive to disk, returning the path written and the number
    /// of rows in it.
    pub fn finish(mut self) -> Result<(PathBuf, usize), ArchiveError> {
        self.writer.flush()
            .map_err(|e| ArchiveError::CannotFlush(self.path.clone(), e))?;

        Ok((self.path, self.num_rows))
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Write a whole table at once.
pub fn write_table<R, P, I, T>(root: R, path: P, rows: I) -> Result<PathBuf, ArchiveError>
where
    R: AsRef<Path>,
    P: AsRef<Path>,
    I: IntoIterator<Item = T>,
    T: AsRef<[f64]>
{
    let mut archiver = Archiver::from_path(root, path)?;

    for row in rows {
        archiver.write_row(row.as_ref())?;
    }

    let (path, num_rows) = archiver.finish()?;
    debug!("Wrote {} rows to {:?}", num_rows, path);

    Ok(path)
}

/// Read a table written by an [`Archiver`].
pub fn read_table<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<f64>>, ArchiveError> {
    let path = path.as_ref().to_path_buf();

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(DELIMITER)
        .trim(Trim::All)
        .from_path(&path)
        .map_err(|e| ArchiveError::CannotOpen(path.clone(), e))?;

    let mut rows = Vec::new();
    for (i, record) in reader.deserialize::<Vec<f64>>().enumerate() {
        rows.push(record.map_err(|e| ArchiveError::CannotRead(path.clone(), i, e))?);
    }

    Ok(rows)
}

#[cfg(test)]
mod test {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("util_archive_{}_{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_table_read_back() {
        let dir = scratch_dir("read_back");

        let rows = vec![
            vec![0.0, -1.5, 0.1 + 0.2],
            vec![1e-12, 3.0, std::f64::consts::PI],
        ];
        let path = write_table(&dir, "table.txt", &rows).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert_eq!(contents.lines().next().unwrap().split(' ').count(), 3);

        assert_eq!(read_table(&path).unwrap(), rows);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let dir = scratch_dir("ragged");

        let mut archiver = Archiver::from_path(&dir, "ragged.txt").unwrap();
        archiver.write_row(&[1.0, 2.0]).unwrap();
        assert!(matches!(
            archiver.write_row(&[1.0]),
            Err(ArchiveError::CannotWrite(_, 1, _))
        ));

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_finish_reports_rows() {
        let dir = scratch_dir("finish");

        let mut archiver = Archiver::from_path(&dir, "rows.txt").unwrap();
        for i in 0..4 {
            archiver.write_row(&[i as f64, 0.5]).unwrap();
        }
        let (path, num_rows) = archiver.finish().unwrap();

        assert_eq!(num_rows, 4);
        assert_eq!(read_table(&path).unwrap().len(), num_rows);

        std::fs::remove_dir_all(dir).ok();
    }
}
