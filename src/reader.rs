//! CSV row reader
//!
//! Turns a comma-separated file into header-keyed rows. The first record is
//! always the header. Rows whose fields are all blank are skipped, and data
//! lines with a different column count are padded or truncated to the header.
//! Fields are decoded as UTF-8; invalid bytes (typically Latin-1 spreadsheet
//! exports) become U+FFFD instead of failing the file.

use std::{
    borrow::Cow,
    fs::File,
    io,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use tracing::{debug, warn};

/// One data line keyed by header name.
pub type RawRow = IndexMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("CSV file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("CSV read successfully but contains no rows")]
    Empty,
    #[error("failed to open CSV file ({}): {error}", path.display())]
    Open { error: io::Error, path: PathBuf },
    #[error("malformed CSV: {0}")]
    Csv(csv::Error),
}

pub struct RowReader<R> {
    header: Vec<String>,
    records: csv::ByteRecordsIntoIter<R>,
    pending: Option<RawRow>,
}

/// Open a CSV file and position the reader on its first data row.
pub fn open(path: impl AsRef<Path>) -> Result<RowReader<File>, Error> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|error| match error.kind() {
        io::ErrorKind::NotFound => Error::NotFound(path.to_owned()),
        _ => Error::Open {
            error,
            path: path.to_owned(),
        },
    })?;
    RowReader::from_reader(file)
}

fn decode(field: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(field)
}

impl<R: io::Read> RowReader<R> {
    pub fn from_reader(reader: R) -> Result<Self, Error> {
        let mut records = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader)
            .into_byte_records();
        let header = match records.next() {
            Some(Ok(header)) => header
                .iter()
                .map(decode)
                .enumerate()
                .map(|(idx, name)| {
                    let name: &str = if idx == 0 {
                        name.trim_start_matches('\u{feff}')
                    } else {
                        &name
                    };
                    name.trim().to_owned()
                })
                .collect::<Vec<_>>(),
            Some(Err(error)) => return Err(Error::Csv(error)),
            None => return Err(Error::Empty),
        };
        debug!(columns = header.len(), "read CSV header");
        let mut reader = Self {
            header,
            records,
            pending: None,
        };
        match reader.next_row() {
            Some(Ok(row)) => reader.pending = Some(row),
            Some(Err(error)) => return Err(error),
            None => return Err(Error::Empty),
        }
        Ok(reader)
    }

    fn next_row(&mut self) -> Option<Result<RawRow, Error>> {
        for record in self.records.by_ref() {
            let record = match record {
                Ok(record) => record,
                Err(error) => return Some(Err(Error::Csv(error))),
            };
            let fields = record.iter().map(decode).collect::<Vec<_>>();
            if fields.iter().all(|field| field.trim().is_empty()) {
                continue;
            }
            if fields.iter().any(|field| matches!(field, Cow::Owned(_))) {
                warn!(
                    line = record.position().map(|pos| pos.line()),
                    "replaced invalid UTF-8 in CSV row"
                );
            }
            let row = self
                .header
                .iter()
                .cloned()
                .zip(
                    fields
                        .into_iter()
                        .map(Cow::into_owned)
                        .chain(std::iter::repeat_with(String::new)),
                )
                .collect();
            return Some(Ok(row));
        }
        None
    }
}

impl<R: io::Read> Iterator for RowReader<R> {
    type Item = Result<RawRow, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.pending.take() {
            Some(row) => Some(Ok(row)),
            None => self.next_row(),
        }
    }
}
