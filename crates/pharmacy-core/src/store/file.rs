//! Line-oriented record readers and writers.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{
    OpenMode, ParseError, ReadOutcome, RecordError, RecordResult, StoreError, StoreResult,
};

impl OpenMode {
    /// Open `path` in this mode. Failures are reported as [`StoreError::FileOpen`].
    pub fn open(self, path: &Path) -> StoreResult<File> {
        let mut options = OpenOptions::new();
        match self {
            OpenMode::Read => options.read(true),
            OpenMode::Append => options.append(true).create(true),
            OpenMode::Truncate => options.write(true).truncate(true).create(true),
        };
        options.open(path).map_err(|source| StoreError::FileOpen {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Reads record lines one at a time, tracking line numbers for diagnostics.
///
/// Blank lines are skipped but still counted. Lines are decoded one at a
/// time, so a line that is not UTF-8 is malformed without ending the read.
pub struct RecordReader<R = BufReader<File>> {
    name: String,
    source: R,
    line: usize,
    raw: Vec<u8>,
    buf: String,
}

impl RecordReader {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let file = OpenMode::Read.open(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::from_reader(name, BufReader::new(file)))
    }
}

impl<R: BufRead> RecordReader<R> {
    /// Wrap any buffered source; `name` is used in parse errors.
    pub fn from_reader(name: impl Into<String>, source: R) -> Self {
        Self {
            name: name.into(),
            source,
            line: 0,
            raw: Vec::new(),
            buf: String::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Line number of the most recently read line.
    pub fn line_number(&self) -> usize {
        self.line
    }

    /// Next non-blank line without its line terminator, or `None` at end of input.
    ///
    /// A line that is not valid UTF-8 yields [`RecordError::InvalidEncoding`];
    /// its lossy text is kept for diagnostics.
    pub fn next_line(&mut self) -> io::Result<Option<RecordResult<&str>>> {
        if !self.fill_raw()? {
            return Ok(None);
        }
        self.buf.clear();
        match std::str::from_utf8(&self.raw) {
            Ok(text) => {
                self.buf.push_str(text);
                Ok(Some(Ok(self.buf.as_str())))
            }
            Err(e) => {
                self.buf.push_str(&String::from_utf8_lossy(&self.raw));
                Ok(Some(Err(RecordError::InvalidEncoding {
                    offset: e.valid_up_to(),
                })))
            }
        }
    }

    /// Load the next non-blank line's bytes into `raw`. False at end of input.
    fn fill_raw(&mut self) -> io::Result<bool> {
        loop {
            self.raw.clear();
            if self.source.read_until(b'\n', &mut self.raw)? == 0 {
                return Ok(false);
            }
            self.line += 1;
            while matches!(self.raw.last(), Some(b'\n' | b'\r')) {
                self.raw.pop();
            }
            if !self.raw.iter().all(u8::is_ascii_whitespace) {
                return Ok(true);
            }
        }
    }

    /// Read the next record with `parse`.
    ///
    /// A parse failure becomes [`ReadOutcome::Malformed`] carrying the file
    /// name, line number and raw line. Only I/O failures are returned as errors.
    pub fn read_with<T>(
        &mut self,
        mut parse: impl FnMut(&str) -> RecordResult<T>,
    ) -> StoreResult<ReadOutcome<T>> {
        let Some(line) = self.next_line()? else {
            return Ok(ReadOutcome::EndOfInput);
        };
        let parsed = line.and_then(|text| parse(text));
        Ok(match parsed {
            Ok(record) => ReadOutcome::Record(record),
            Err(reason) => ReadOutcome::Malformed(ParseError {
                file: self.name.clone(),
                line: self.line,
                content: self.buf.clone(),
                reason,
            }),
        })
    }
}

/// Writes record lines to a file opened for append or truncate.
///
/// Output is buffered; call [`RecordWriter::finish`] to flush and close.
pub struct RecordWriter {
    path: PathBuf,
    out: BufWriter<File>,
    written: usize,
}

impl RecordWriter {
    pub fn open(path: &Path, mode: OpenMode) -> StoreResult<Self> {
        if mode == OpenMode::Read {
            return Err(StoreError::FileOpen {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "writer opened for reading"),
            });
        }
        let file = mode.open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one record line; the terminator is added here.
    pub fn write_line(&mut self, line: &str) -> StoreResult<()> {
        self.out.write_all(line.as_bytes())?;
        self.out.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Flush buffered lines and close the file. Returns the number of lines written.
    pub fn finish(mut self) -> StoreResult<usize> {
        self.out.flush()?;
        Ok(self.written)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn reader(text: &str) -> RecordReader<Cursor<Vec<u8>>> {
        RecordReader::from_reader("test.txt", Cursor::new(text.as_bytes().to_vec()))
    }

    fn parse_number(line: &str) -> RecordResult<u32> {
        line.parse().map_err(|_| RecordError::InvalidNumber {
            field: "value",
            value: line.to_string(),
        })
    }

    #[test]
    fn test_blank_lines_skipped_but_counted() {
        let mut reader = reader("1\n\n  \r\n2\r\n");

        assert_eq!(reader.read_with(parse_number).unwrap(), ReadOutcome::Record(1));
        assert_eq!(reader.read_with(parse_number).unwrap(), ReadOutcome::Record(2));
        assert_eq!(reader.line_number(), 4);
        assert_eq!(reader.read_with(parse_number).unwrap(), ReadOutcome::EndOfInput);
    }

    #[test]
    fn test_malformed_carries_location() {
        let mut reader = reader("7\nseven\n8");

        assert_eq!(reader.read_with(parse_number).unwrap(), ReadOutcome::Record(7));
        match reader.read_with(parse_number).unwrap() {
            ReadOutcome::Malformed(err) => {
                assert_eq!(err.file, "test.txt");
                assert_eq!(err.line, 2);
                assert_eq!(err.content, "seven");
            }
            other => panic!("expected malformed, got {other:?}"),
        }
        // the loop can continue past a bad line
        assert_eq!(reader.read_with(parse_number).unwrap(), ReadOutcome::Record(8));
    }

    #[test]
    fn test_invalid_utf8_line_is_malformed() {
        let mut bytes = b"1\n".to_vec();
        bytes.extend_from_slice(b"\xC0\xEF\xF2\r\n");
        bytes.extend_from_slice(b"2\n");
        let mut reader = RecordReader::from_reader("cp1251.txt", Cursor::new(bytes));

        assert_eq!(reader.read_with(parse_number).unwrap(), ReadOutcome::Record(1));
        match reader.read_with(parse_number).unwrap() {
            ReadOutcome::Malformed(err) => {
                assert_eq!(err.line, 2);
                assert_eq!(err.reason, RecordError::InvalidEncoding { offset: 0 });
                assert_eq!(err.content, "\u{FFFD}\u{FFFD}\u{FFFD}");
            }
            other => panic!("expected malformed, got {other:?}"),
        }
        assert_eq!(reader.read_with(parse_number).unwrap(), ReadOutcome::Record(2));
        assert_eq!(reader.read_with(parse_number).unwrap(), ReadOutcome::EndOfInput);
    }

    #[test]
    fn test_missing_file_is_file_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RecordReader::open(&dir.path().join("absent.txt"))
            .err()
            .unwrap();
        assert!(err.is_missing_file());
    }

    #[test]
    fn test_truncate_then_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.txt");

        let mut writer = RecordWriter::open(&path, OpenMode::Truncate).unwrap();
        writer.write_line("a").unwrap();
        writer.write_line("b").unwrap();
        assert_eq!(writer.finish().unwrap(), 2);

        let mut writer = RecordWriter::open(&path, OpenMode::Append).unwrap();
        writer.write_line("c").unwrap();
        writer.finish().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb\nc\n");

        let mut writer = RecordWriter::open(&path, OpenMode::Truncate).unwrap();
        writer.write_line("d").unwrap();
        writer.finish().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "d\n");
    }

    #[test]
    fn test_writer_rejects_read_mode() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RecordWriter::open(&dir.path().join("x.txt"), OpenMode::Read).is_err());
    }
}
