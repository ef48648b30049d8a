//! Delimited-text dialects for the output table and its checkpoints.
//!
//! Quoted dialects go through the `csv` crate. `Quoting::None` writes no
//! quotes at all and escapes special characters with the escape character,
//! which `csv` can't express, so that dialect has its own writer and reader.

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;

use crate::config::{DialectConfig, Quoting};

#[derive(Debug, Clone, PartialEq)]
pub struct Dialect {
    pub delimiter: u8,
    pub quote: u8,
    pub escape: u8,
    pub quoting: Quoting,
}

impl From<&DialectConfig> for Dialect {
    fn from(config: &DialectConfig) -> Self {
        // Config::validate guarantees ascii
        Self {
            delimiter: config.delimiter as u8,
            quote: config.quotechar as u8,
            escape: config.escape_char as u8,
            quoting: config.quoting,
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push("-tmp");
    path.with_file_name(name)
}

impl Dialect {
    fn quote_style(&self) -> csv::QuoteStyle {
        match self.quoting {
            Quoting::All => csv::QuoteStyle::Always,
            Quoting::Minimal => csv::QuoteStyle::Necessary,
            Quoting::NonNumeric => csv::QuoteStyle::NonNumeric,
            Quoting::None => csv::QuoteStyle::Never,
        }
    }

    /// Writes to a sibling temp file and renames it over `path`.
    pub fn write(&self, path: &Path, headers: &[String], rows: &[Vec<String>]) -> anyhow::Result<()> {
        let temp = temp_path(path);

        let bytes = match self.quoting {
            Quoting::None => self.encode_escaped(headers, rows),
            _ => self.encode_quoted(headers, rows)?,
        };

        std::fs::write(&temp, bytes).with_context(|| format!("failed to write {}", temp.display()))?;
        std::fs::rename(&temp, path)
            .with_context(|| format!("failed to move {} into place", path.display()))?;

        Ok(())
    }

    fn encode_quoted(&self, headers: &[String], rows: &[Vec<String>]) -> anyhow::Result<Vec<u8>> {
        let mut csv_wrt = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .quote(self.quote)
            .quote_style(self.quote_style())
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(vec![]);

        csv_wrt.write_record(headers)?;
        for row in rows {
            csv_wrt.write_record(row)?;
        }

        Ok(csv_wrt.into_inner()?)
    }

    fn escape_field(&self, field: &str, out: &mut Vec<u8>) {
        for &b in field.as_bytes() {
            if b == self.escape || b == self.delimiter || b == self.quote || b == b'\n' || b == b'\r' {
                out.push(self.escape);
            }
            out.push(b);
        }
    }

    fn encode_escaped(&self, headers: &[String], rows: &[Vec<String>]) -> Vec<u8> {
        let mut out = Vec::new();
        for record in std::iter::once(headers).chain(rows.iter().map(Vec::as_slice)) {
            for (idx, field) in record.iter().enumerate() {
                if idx > 0 {
                    out.push(self.delimiter);
                }
                self.escape_field(field, &mut out);
            }
            // an infallible write into a Vec
            let _ = out.write_all(b"\n");
        }
        out
    }

    /// Reads a table written by [`Dialect::write`]: header row plus records.
    pub fn read(&self, path: &Path) -> anyhow::Result<(Vec<String>, Vec<Vec<String>>)> {
        let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;

        let mut records = match self.quoting {
            Quoting::None => self.decode_escaped(&bytes)?,
            _ => self.decode_quoted(&bytes)?,
        };

        if records.is_empty() {
            anyhow::bail!("{} is empty", path.display());
        }

        let headers = records.remove(0);
        Ok((headers, records))
    }

    fn decode_quoted(&self, bytes: &[u8]) -> anyhow::Result<Vec<Vec<String>>> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .quote(self.quote)
            .has_headers(false)
            .from_reader(bytes);

        let mut records = vec![];
        for record in csv_reader.records() {
            let record = record?;
            records.push(record.iter().map(str::to_string).collect());
        }
        Ok(records)
    }

    fn decode_escaped(&self, bytes: &[u8]) -> anyhow::Result<Vec<Vec<String>>> {
        let mut records = Vec::new();
        let mut record: Vec<String> = Vec::new();
        let mut field: Vec<u8> = Vec::new();

        let mut iter = bytes.iter().copied().peekable();
        while let Some(b) = iter.next() {
            if b == self.escape {
                match iter.next() {
                    Some(next) => field.push(next),
                    None => anyhow::bail!("dangling escape character at end of file"),
                }
            } else if b == self.delimiter {
                record.push(String::from_utf8(std::mem::take(&mut field))?);
            } else if b == b'\n' || (b == b'\r' && iter.peek() == Some(&b'\n')) {
                if b == b'\r' {
                    iter.next();
                }
                record.push(String::from_utf8(std::mem::take(&mut field))?);
                records.push(std::mem::take(&mut record));
            } else {
                field.push(b);
            }
        }

        if !field.is_empty() || !record.is_empty() {
            record.push(String::from_utf8(field)?);
            records.push(record);
        }

        Ok(records)
    }
}
