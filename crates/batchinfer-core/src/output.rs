//! Output writers for the three record layouts the commands emit.
//!
//! - [`NdjsonWriter`]: one `{id: result}` object per line
//! - [`JsonObjectWriter`]: a single JSON object assembled record by record,
//!   flushed after every record so a halted run leaves its results on disk
//! - [`write_json_file`]: one JSON document per input item

use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

/// Writes one JSON value per line (newline-delimited JSON).
pub struct NdjsonWriter<W: Write> {
    writer: W,
    records_written: usize,
}

impl<W: Write> NdjsonWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            records_written: 0,
        }
    }

    /// Write any serializable value as a single line.
    pub fn write<T: Serialize>(&mut self, item: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?;
        writeln!(self.writer)?;
        self.records_written += 1;
        Ok(())
    }

    /// Write a `{id: result}` record, the layout every NDJSON command uses.
    pub fn write_keyed<T: Serialize>(&mut self, id: &str, result: &T) -> io::Result<()> {
        let mut record = serde_json::Map::with_capacity(1);
        record.insert(
            id.to_string(),
            serde_json::to_value(result).map_err(io::Error::other)?,
        );
        self.write(&record)
    }

    /// Number of lines written so far.
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Incrementally writes a single JSON object, one member at a time.
///
/// Layout matches what downstream consumers of `results.json` expect:
///
/// ```text
/// {
///   "id-1": "label",
///   "id-2": "label"
/// }
/// ```
pub struct JsonObjectWriter<W: Write> {
    writer: W,
    members_written: usize,
}

impl<W: Write> JsonObjectWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            members_written: 0,
        }
    }

    /// Append one member and flush it to the underlying writer.
    pub fn write_member<T: Serialize>(&mut self, key: &str, value: &T) -> io::Result<()> {
        if self.members_written == 0 {
            self.writer.write_all(b"{\n")?;
        } else {
            self.writer.write_all(b",\n")?;
        }
        let key = serde_json::to_string(key).map_err(io::Error::other)?;
        let value = serde_json::to_string(value).map_err(io::Error::other)?;
        write!(self.writer, "  {key}: {value}")?;
        self.writer.flush()?;
        self.members_written += 1;
        Ok(())
    }

    /// Number of members written so far.
    pub fn members_written(&self) -> usize {
        self.members_written
    }

    /// Close the object. An object with no members is written as `{}`.
    pub fn finish(mut self) -> io::Result<W> {
        if self.members_written == 0 {
            self.writer.write_all(b"{}")?;
        } else {
            self.writer.write_all(b"\n}")?;
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Write a single JSON document to `path`, replacing any existing file.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let json = serde_json::to_string(value).map_err(io::Error::other)?;
    std::fs::write(path, json)
}
