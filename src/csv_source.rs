//! CSV input: cleaning, address merging and namespaced record IDs

use linkx_core::{Error, FieldValue, Record, RecordId, RecordSet, RecordSource, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Name of the field built from merged address columns
pub const MERGED_ADDRESS_FIELD: &str = "Address";

/// Clean one cell before it enters the model.
///
/// Folds to ASCII, drops dashes, apostrophes and commas, turns newlines,
/// slashes and colons into spaces, collapses runs of whitespace, strips
/// surrounding quotes and lowercases.
pub fn preprocess(value: &str) -> String {
    let folded = fold_ascii(value);

    let mut cleaned = String::with_capacity(folded.len());
    for c in folded.chars() {
        match c {
            '-' | '\'' | ',' => {}
            '\n' | '\r' | '/' | ':' => cleaned.push(' '),
            _ => cleaned.push(c),
        }
    }

    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_lowercase()
}

/// Strip diacritics and transliterate letters that have no decomposition.
/// Anything else outside ASCII is dropped.
fn fold_ascii(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.nfd() {
        if ch.is_ascii() {
            out.push(ch);
            continue;
        }
        if unicode_normalization::char::is_combining_mark(ch) {
            continue;
        }
        for lc in ch.to_lowercase() {
            match lc {
                'ß' => out.push_str("ss"),
                'æ' | 'ǽ' => out.push_str("ae"),
                'œ' => out.push_str("oe"),
                'þ' => out.push_str("th"),
                'ø' => out.push('o'),
                'đ' | 'ð' => out.push('d'),
                'ł' => out.push('l'),
                'ı' => out.push('i'),
                'ħ' => out.push('h'),
                _ => {}
            }
        }
    }
    out
}

/// Raw rows of a CSV file, kept for writing linked output
#[derive(Debug, Clone, Default)]
pub struct CsvTable {
    pub prefix: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// Raw row behind a record ID of this table
    pub fn row(&self, id: &RecordId) -> Option<&[String]> {
        match id {
            RecordId::Tagged(ns, seq) if *ns == self.prefix => {
                self.rows.get(usize::try_from(*seq).ok()?).map(Vec::as_slice)
            }
            _ => None,
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        (0..self.rows.len()).map(|i| RecordId::tagged(self.prefix.clone(), i as u64))
    }
}

/// A CSV file read as records with IDs `(prefix, row)`.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    prefix: String,
    merge_address_fields: Vec<String>,
}

impl CsvSource {
    pub fn new<P: AsRef<Path>, S: Into<String>>(path: P, prefix: S) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            prefix: prefix.into(),
            merge_address_fields: Vec::new(),
        }
    }

    /// Concatenate these columns into the `Address` field. Needs at least
    /// two columns to take effect.
    pub fn with_merged_address(mut self, fields: &[String]) -> Self {
        self.merge_address_fields = fields.to_vec();
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn read_table(&self) -> Result<CsvTable> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| csv_err(&self.path, e))?;
        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| csv_err(&self.path, e))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for row in reader.records() {
            let row = row.map_err(|e| csv_err(&self.path, e))?;
            let mut values: Vec<String> = row.iter().map(str::to_string).collect();
            values.resize(headers.len(), String::new());
            rows.push(values);
        }

        tracing::debug!(path = %self.path.display(), rows = rows.len(), columns = headers.len(), "read csv");
        Ok(CsvTable {
            prefix: self.prefix.clone(),
            headers,
            rows,
        })
    }

    /// Cleaned records of an already loaded table
    pub fn records_of(&self, table: &CsvTable) -> Result<Vec<Record>> {
        let merge: Vec<usize> = if self.merge_address_fields.len() > 1 {
            self.merge_address_fields
                .iter()
                .map(|name| {
                    table.headers.iter().position(|h| h == name).ok_or_else(|| {
                        Error::config(format!("{} has no column '{}' to merge", self.path.display(), name))
                    })
                })
                .collect::<Result<_>>()?
        } else {
            Vec::new()
        };

        let records = table
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let mut fields: BTreeMap<String, FieldValue> = table
                    .headers
                    .iter()
                    .zip(row)
                    .map(|(header, raw)| (header.clone(), cell(raw)))
                    .collect();
                if !merge.is_empty() {
                    let joined = merge.iter().map(|&c| row[c].as_str()).collect::<Vec<_>>().join(" ");
                    fields.insert(MERGED_ADDRESS_FIELD.to_string(), cell(&joined));
                }
                Record::new(RecordId::tagged(self.prefix.clone(), i as u64), fields)
            })
            .collect();
        Ok(records)
    }

    /// Read the file and return both its raw table and its record set
    pub fn load(&self) -> Result<(CsvTable, RecordSet)> {
        let table = self.read_table()?;
        let records = self.records_of(&table)?;
        Ok((table, records.into_iter().collect()))
    }
}

impl RecordSource for CsvSource {
    fn records(&self) -> Result<Vec<Record>> {
        let table = self.read_table()?;
        self.records_of(&table)
    }
}

fn cell(raw: &str) -> FieldValue {
    let cleaned = preprocess(raw);
    if cleaned.is_empty() {
        FieldValue::Null
    } else {
        FieldValue::Text(cleaned)
    }
}

fn csv_err(path: &Path, e: csv::Error) -> Error {
    if e.is_io_error() {
        match e.into_kind() {
            csv::ErrorKind::Io(io) => Error::Io(io),
            other => Error::Serialization(format!("{}: {:?}", path.display(), other)),
        }
    } else {
        Error::Serialization(format!("{}: {}", path.display(), e))
    }
}
