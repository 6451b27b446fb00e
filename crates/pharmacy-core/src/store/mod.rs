//! Flat-file persistence for the pharmacy inventory.
//!
//! Every entity is one line of `;`-separated fields. Products and operations
//! start with a type tag (`[TABLET]`, `SUPPLY`, ...); branches, analogue links
//! and stock levels have fixed positional layouts. See [`codec`] for the exact
//! field order of each record.
//!
//! Reading distinguishes three outcomes per call: a parsed record, the end of
//! the file, and a malformed line with its location. Bulk loaders skip
//! malformed lines and stop at the end of input.

pub mod codec;
mod file;
mod loader;

pub use codec::StockRecord;
pub use file::*;
pub use loader::*;

use std::path::PathBuf;

use thiserror::Error;

use crate::models::DomainError;

/// Why a single record line could not be turned into an entity.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("unknown record tag '{0}'")]
    UnknownTag(String),

    #[error("invalid number for {field}: '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("invalid flag for {field}: '{value}'")]
    InvalidBool { field: &'static str, value: String },

    #[error("invalid date '{0}'")]
    InvalidDate(String),

    #[error("line is not valid UTF-8 (from byte {offset})")]
    InvalidEncoding { offset: usize },

    #[error("unknown product '{0}'")]
    UnknownProduct(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

pub type RecordResult<T> = Result<T, RecordError>;

/// A malformed line, located in its file.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{file}:{line}: {reason} (line: '{content}')")]
pub struct ParseError {
    pub file: String,
    /// 1-based line number
    pub line: usize,
    /// Raw line as read
    pub content: String,
    #[source]
    pub reason: RecordError,
}

/// Storage errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The file could not be opened. Kept apart from parse failures so a
    /// missing file can be treated as empty state.
    #[error("Cannot open {}: {}", .path.display(), .source)]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// True when the error is a file that does not exist.
    pub fn is_missing_file(&self) -> bool {
        matches!(
            self,
            StoreError::FileOpen { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

/// Result of one read from a [`RecordReader`].
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome<T> {
    Record(T),
    /// No more lines; ends a read loop
    EndOfInput,
    /// The line was malformed; a read loop may skip it and continue
    Malformed(ParseError),
}

/// How a record file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    /// Add lines after the existing content, creating the file if needed
    Append,
    /// Discard existing content; used for full rewrites
    Truncate,
}
