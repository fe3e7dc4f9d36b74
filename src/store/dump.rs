//! Flat-file dump format: one `hex(key):hex(value)` line per entry.
//!
//! Values are written as stored, i.e. compressed.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::storage::Row;

/// A line that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MalformedLine {
    pub line: usize,
    pub reason: String,
}

#[derive(Debug)]
pub(crate) enum ReadError {
    Io(io::Error),
    Malformed(MalformedLine),
}

/// Write `entries` to `path`, replacing it atomically.
pub(crate) fn write_entries<'a, I>(path: &Path, entries: I) -> io::Result<usize>
where
    I: IntoIterator<Item = (&'a [u8], &'a [u8])>,
{
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = Path::new(&tmp);

    let mut count = 0;
    {
        let file = File::create(tmp)?;
        let mut writer = BufWriter::new(file);
        for (key, value) in entries {
            writeln!(writer, "{}:{}", hex::encode(key), hex::encode(value))?;
            count += 1;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(tmp, path)?;
    Ok(count)
}

/// A parsed entry and the 1-based line it came from.
pub(crate) type NumberedRow = (usize, Row);

/// Read every entry from `path`. A missing file yields `None`.
pub(crate) fn read_entries(path: &Path) -> Result<Option<Vec<NumberedRow>>, ReadError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ReadError::Io(e)),
    };

    let mut rows = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(ReadError::Io)?;
        if line.is_empty() {
            continue;
        }
        let row = parse_line(&line).map_err(|reason| {
            ReadError::Malformed(MalformedLine {
                line: index + 1,
                reason,
            })
        })?;
        rows.push((index + 1, row));
    }
    Ok(Some(rows))
}

fn parse_line(line: &str) -> Result<Row, String> {
    let (key, value) = line
        .split_once(':')
        .ok_or_else(|| "missing ':' separator".to_string())?;
    if value.contains(':') {
        return Err("more than one ':' separator".into());
    }
    if key.is_empty() {
        return Err("empty key".into());
    }
    let key = hex::decode(key).map_err(|e| format!("invalid key hex: {e}"))?;
    let value = hex::decode(value).map_err(|e| format!("invalid value hex: {e}"))?;
    Ok((key, value))
}
