use std::fs::{self, File};
use std::io;
use std::marker::PhantomData;
use std::path::Path;

use engine_logging::engine_info;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    Ok(())
}

/// Read every row of a CSV file with a header line.
///
/// A missing file is an empty result: that is the first-run case.
pub fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, PersistError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    let mut reader = csv::Reader::from_reader(file);
    let rows = reader
        .deserialize()
        .collect::<Result<Vec<T>, csv::Error>>()?;
    engine_info!("Loaded {} rows from {:?}", rows.len(), path);
    Ok(rows)
}

/// Incremental CSV writer: header first, then one flushed row per call.
pub struct CsvRowWriter<T> {
    writer: csv::Writer<File>,
    rows: usize,
    _row: PhantomData<fn(&T)>,
}

impl<T: Serialize> CsvRowWriter<T> {
    /// Truncates `path` and writes `header`.
    pub fn create(path: &Path, header: &[&str]) -> Result<Self, PersistError> {
        if let Some(parent) = path.parent() {
            ensure_output_dir(parent)?;
        }
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)?;
        writer.write_record(header)?;
        writer.flush()?;
        Ok(Self {
            writer,
            rows: 0,
            _row: PhantomData,
        })
    }

    pub fn write(&mut self, row: &T) -> Result<(), PersistError> {
        self.writer.serialize(row)?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn write_all<'a>(
        &mut self,
        rows: impl IntoIterator<Item = &'a T>,
    ) -> Result<(), PersistError>
    where
        T: 'a,
    {
        for row in rows {
            self.write(row)?;
        }
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }
}
