pub mod codec;

use std::{fmt, path::Path, str::FromStr};

use anyhow::bail;

use crate::errors::LoadError;
pub use codec::Dialect;

pub const URL_COLUMN: &str = "url";
pub const TITLE_COLUMN: &str = "title";
pub const TAGS_COLUMN: &str = "tags";
pub const STATUS_COLUMN: &str = "processing_status";
/// Appended after the original columns, in this order.
pub const ENRICHMENT_COLUMNS: [&str; 4] = ["description", "ai_tags", "author", "formatted_title"];

pub const EXTRACTION_FAILED_PREFIX: &str = "Could not access content from: ";
pub const PROCESSING_FAILED: &str = "Processing failed";

/// Input delimiters, tried in this order.
const DELIMITERS: [u8; 3] = [b';', b',', b'\t'];
const MIN_COLUMNS: usize = 3;
const TAG_SEPARATOR: &str = ", ";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProcessingStatus::Pending)
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl FromStr for ProcessingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(ProcessingStatus::Pending),
            "completed" => Ok(ProcessingStatus::Completed),
            "failed" => Ok(ProcessingStatus::Failed),
            other => bail!("unknown processing status {other:?}"),
        }
    }
}

/// Whether `description` is one of the placeholders written for failed rows.
pub fn is_failure_description(description: &str) -> bool {
    description.starts_with(EXTRACTION_FAILED_PREFIX) || description == PROCESSING_FAILED
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookmarkRecord {
    /// Original values, aligned with [`BookmarkTable::headers`].
    pub columns: Vec<String>,

    pub url: String,
    pub title: String,
    pub existing_tags: String,

    pub description: String,
    pub ai_tags: Vec<String>,
    pub author: String,
    pub formatted_title: String,
    pub status: ProcessingStatus,
}

impl BookmarkRecord {
    pub fn mark_failed(&mut self, description: String) {
        self.description = description;
        self.ai_tags.clear();
        self.author.clear();
        self.formatted_title = self.title.clone();
        self.status = ProcessingStatus::Failed;
    }

    pub fn reset(&mut self) {
        self.description.clear();
        self.ai_tags.clear();
        self.author.clear();
        self.formatted_title.clear();
        self.status = ProcessingStatus::Pending;
    }

    fn output_row(&self, with_status: bool) -> Vec<String> {
        let mut row = self.columns.clone();
        row.extend([
            self.description.clone(),
            self.ai_tags.join(TAG_SEPARATOR),
            self.author.clone(),
            self.formatted_title.clone(),
        ]);
        if with_status {
            row.push(self.status.to_string());
        }
        row
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
}

/// The working table: original columns plus enrichment state, in input order.
#[derive(Debug, Clone, Default)]
pub struct BookmarkTable {
    pub headers: Vec<String>,
    pub records: Vec<BookmarkRecord>,
}

impl BookmarkTable {
    /// Reads the input table, detecting the delimiter.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read(path).map_err(|source| LoadError::IO {
            path: path.to_path_buf(),
            source,
        })?;

        if let Err(source) = std::str::from_utf8(&content) {
            return Err(LoadError::Encoding {
                path: path.to_path_buf(),
                source,
            });
        }

        for delimiter in DELIMITERS {
            let Some((headers, rows)) = parse_delimited(&content, delimiter) else {
                continue;
            };

            log::debug!(
                "{} parsed with delimiter {:?}: {} columns, {} rows",
                path.display(),
                delimiter as char,
                headers.len(),
                rows.len()
            );

            if !headers.iter().any(|h| h == URL_COLUMN) {
                return Err(LoadError::MissingUrlColumn(path.to_path_buf()));
            }

            return Ok(Self::from_rows(headers, rows));
        }

        Err(LoadError::NoDelimiter(path.to_path_buf()))
    }

    /// Builds records from raw rows. Columns that collide with enrichment
    /// output are dropped from the original set.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let keep = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !ENRICHMENT_COLUMNS.contains(&h.as_str()) && h.as_str() != STATUS_COLUMN)
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();

        if keep.len() != headers.len() {
            log::warn!("input already has enrichment columns, they will be overwritten");
        }

        let position = |name: &str| headers.iter().position(|h| h == name);
        let url_idx = position(URL_COLUMN);
        let title_idx = position(TITLE_COLUMN);
        let tags_idx = position(TAGS_COLUMN);

        let field = |row: &Vec<String>, idx: Option<usize>| {
            idx.and_then(|i| row.get(i)).map(|v| v.trim().to_string()).unwrap_or_default()
        };

        let records = rows
            .iter()
            .map(|row| BookmarkRecord {
                columns: keep.iter().map(|&i| row.get(i).cloned().unwrap_or_default()).collect(),
                url: field(row, url_idx),
                title: field(row, title_idx),
                existing_tags: field(row, tags_idx),
                ..Default::default()
            })
            .collect();

        let headers = keep.iter().map(|&i| headers[i].clone()).collect();

        Self { headers, records }
    }

    /// Copies enrichment state from a previous output into this table by row
    /// position. Returns how many rows were restored.
    pub fn merge_resume(&mut self, path: &Path, dialect: &Dialect) -> anyhow::Result<usize> {
        let (headers, rows) = dialect.read(path)?;

        let position = |name: &str| headers.iter().position(|h| h == name);
        let mut enrichment_idx = Vec::with_capacity(ENRICHMENT_COLUMNS.len());
        for name in ENRICHMENT_COLUMNS {
            match position(name) {
                Some(idx) => enrichment_idx.push(idx),
                None => bail!("{} has no {name} column", path.display()),
            }
        }
        let status_idx = position(STATUS_COLUMN);

        let mut restored = 0;
        for (record, row) in self.records.iter_mut().zip(rows.iter()) {
            let get = |idx: usize| row.get(idx).cloned().unwrap_or_default();

            record.description = get(enrichment_idx[0]);
            record.ai_tags = get(enrichment_idx[1])
                .split(TAG_SEPARATOR)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
            record.author = get(enrichment_idx[2]);
            record.formatted_title = get(enrichment_idx[3]);

            record.status = match status_idx {
                Some(idx) => get(idx).parse().unwrap_or_default(),
                // finalized output, nothing but the description to go on
                None if is_failure_description(&record.description) => ProcessingStatus::Failed,
                None if !record.description.is_empty() => ProcessingStatus::Completed,
                None => ProcessingStatus::Pending,
            };

            restored += 1;
        }

        if rows.len() != self.records.len() {
            log::warn!(
                "previous output has {} rows, input has {}; rows are matched by position",
                rows.len(),
                self.records.len()
            );
        }

        Ok(restored)
    }

    pub fn output_headers(&self, with_status: bool) -> Vec<String> {
        let mut headers = self.headers.clone();
        headers.extend(ENRICHMENT_COLUMNS.iter().map(|c| c.to_string()));
        if with_status {
            headers.push(STATUS_COLUMN.to_string());
        }
        headers
    }

    /// Writes the whole table. Checkpoints keep the status column, the
    /// final output drops it.
    pub fn write(&self, path: &Path, dialect: &Dialect, with_status: bool) -> anyhow::Result<()> {
        let rows = self
            .records
            .iter()
            .map(|r| r.output_row(with_status))
            .collect::<Vec<_>>();

        dialect.write(path, &self.output_headers(with_status), &rows)
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts {
            total: self.records.len(),
            ..Default::default()
        };
        for record in &self.records {
            match record.status {
                ProcessingStatus::Pending => counts.pending += 1,
                ProcessingStatus::Completed => counts.completed += 1,
                ProcessingStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }
}

/// `None` unless every row parses and there are at least [`MIN_COLUMNS`] columns.
fn parse_delimited(content: &[u8], delimiter: u8) -> Option<(Vec<String>, Vec<Vec<String>>)> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(content);

    let headers = csv_reader
        .headers()
        .ok()?
        .iter()
        .enumerate()
        .map(|(idx, h)| {
            let h = if idx == 0 { h.trim_start_matches('\u{feff}') } else { h };
            h.trim().to_string()
        })
        .collect::<Vec<_>>();

    if headers.len() < MIN_COLUMNS {
        return None;
    }

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record.ok()?;
        if record.len() > headers.len() {
            return None;
        }

        let mut row = record.iter().map(str::to_string).collect::<Vec<_>>();
        row.resize(headers.len(), String::new());
        rows.push(row);
    }

    Some((headers, rows))
}
