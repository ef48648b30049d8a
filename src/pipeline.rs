//! Per-row enrichment state machine with periodic checkpoints and resume.
//!
//! Every record starts `pending` and ends `completed` or `failed`. Terminal
//! rows are never touched again, in this run or any resumed one.

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    path::{Path, PathBuf},
};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::ai::{AiProcessor, SummaryInput};
use crate::bookmarks::{
    BookmarkRecord, BookmarkTable, Dialect, ProcessingStatus, StatusCounts, EXTRACTION_FAILED_PREFIX,
    PROCESSING_FAILED,
};
use crate::config::Config;
use crate::errors::{ExtractionError, FetchError, LoadError};
use crate::extract::ContentSource;
use crate::report;
use crate::text::validate_url;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Checkpoint after this many rows reach a terminal state.
    pub batch_size: usize,
    pub resume: bool,
    pub show_progress: bool,
    pub extract_publisher: bool,
    pub dialect: Dialect,
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.processing.batch_size.max(1),
            resume: config.output.resume_processing,
            show_progress: true,
            extract_publisher: config.processing.extract_publisher,
            dialect: Dialect::from(config.output.dialect(config.output.format)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub counts: StatusCounts,
    pub output_path: PathBuf,
    pub summary_path: PathBuf,
}

pub struct EnrichmentPipeline {
    extractor: Box<dyn ContentSource>,
    processor: AiProcessor,
    options: PipelineOptions,
}

impl EnrichmentPipeline {
    pub fn new(extractor: Box<dyn ContentSource>, processor: AiProcessor, options: PipelineOptions) -> Self {
        Self {
            extractor,
            processor,
            options,
        }
    }

    pub fn load(&self, input: &Path) -> Result<BookmarkTable, LoadError> {
        let table = BookmarkTable::load(input)?;
        log::info!("Loaded {} bookmarks from {}", table.records.len(), input.display());
        Ok(table)
    }

    /// Restores state from a previous output when resuming. Any failure
    /// there leaves every row `pending`.
    pub fn initialize(&self, table: &mut BookmarkTable, output: &Path) {
        if !self.options.resume {
            return;
        }

        if !output.exists() {
            log::info!("Nothing to resume at {}, starting fresh", output.display());
            return;
        }

        match table.merge_resume(output, &self.options.dialect) {
            Ok(restored) => {
                let counts = table.counts();
                log::info!(
                    "Resuming from {}: {restored} rows restored, {} completed, {} failed, {} pending",
                    output.display(),
                    counts.completed,
                    counts.failed,
                    counts.pending
                );
            }
            Err(err) => {
                log::warn!("Could not resume from {}: {err:#}; starting fresh", output.display());
                table.records.iter_mut().for_each(BookmarkRecord::reset);
            }
        }
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        let bar = ProgressBar::new(len as u64);
        if !self.options.show_progress {
            bar.set_draw_target(ProgressDrawTarget::hidden());
            return bar;
        }

        bar.set_style(
            ProgressStyle::with_template("{spinner} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar
    }

    /// Processes every pending row in input order.
    pub fn run(&self, table: &mut BookmarkTable, output: &Path) {
        let pending = table
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.status.is_terminal())
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();

        if pending.is_empty() {
            log::info!("All bookmarks already processed");
            return;
        }

        log::info!("Processing {} pending bookmarks", pending.len());

        let bar = self.progress_bar(pending.len());
        let mut finished = 0;

        for idx in pending {
            {
                let record = &mut table.records[idx];
                let span = tracing::info_span!("bookmark", row = idx);
                let _enter = span.enter();

                bar.set_message(record.url.clone());
                self.process_guarded(record);
            }

            bar.inc(1);
            finished += 1;

            if finished % self.options.batch_size == 0 {
                self.checkpoint(table, output);
            }
        }

        bar.finish_and_clear();
    }

    /// Converts errors and panics into a failed row.
    fn process_guarded(&self, record: &mut BookmarkRecord) {
        match catch_unwind(AssertUnwindSafe(|| self.process_record(record))) {
            Ok(Ok(())) => {
                log::debug!("completed {}", record.url);
            }
            Ok(Err(err)) => {
                log::warn!("Failed to process {}: {err}", record.url);
                let label = if record.title.is_empty() {
                    record.url.clone()
                } else {
                    record.title.clone()
                };
                record.mark_failed(format!("{EXTRACTION_FAILED_PREFIX}{label}"));
            }
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_default();
                log::error!("Processing {} panicked: {msg}", record.url);
                record.mark_failed(PROCESSING_FAILED.to_string());
            }
        }
    }

    pub fn process_record(&self, record: &mut BookmarkRecord) -> Result<(), ExtractionError> {
        if !validate_url(&record.url) {
            return Err(FetchError::InvalidUrl {
                url: record.url.clone(),
                reason: "expected an http(s) url".to_string(),
            }
            .into());
        }

        log::info!("Processing {}", record.url);

        let content = self.extractor.extract(record.url.trim())?;
        log::debug!("extracted {} chars via {:?}", content.text.len(), content.method);

        let title = if record.title.is_empty() || record.title == record.url {
            content.title.clone()
        } else {
            record.title.clone()
        };

        let publisher = if self.options.extract_publisher {
            content.publisher.as_str()
        } else {
            ""
        };

        let result = self.processor.summarize(&SummaryInput {
            title: &title,
            text: &content.text,
            authors: &content.authors,
            publisher,
            existing_tags: &record.existing_tags,
        });

        record.formatted_title = if !title.is_empty() && !publisher.is_empty() {
            format!("{title} - {publisher}")
        } else {
            title
        };
        record.description = result.description;
        record.ai_tags = result.tags;
        record.author = result.author;
        record.status = ProcessingStatus::Completed;

        Ok(())
    }

    /// Overwrites the output with the in-progress table. A failed write is
    /// logged and the run goes on.
    pub fn checkpoint(&self, table: &BookmarkTable, output: &Path) {
        match table.write(output, &self.options.dialect, true) {
            Ok(()) => {
                let counts = table.counts();
                log::info!(
                    "Checkpoint saved: {}/{} rows done",
                    counts.completed + counts.failed,
                    counts.total
                );
            }
            Err(err) => log::error!("Failed to save checkpoint to {}: {err:#}", output.display()),
        }
    }

    /// Writes the final table without the status column, plus the summary report.
    pub fn finalize(&self, table: &BookmarkTable, output: &Path) -> anyhow::Result<RunSummary> {
        table.write(output, &self.options.dialect, false)?;

        let counts = table.counts();
        let summary_path = report::write_summary(output, &counts)?;

        log::info!(
            "Processing complete: {} total, {} completed, {} failed ({:.1}%)",
            counts.total,
            counts.completed,
            counts.failed,
            report::success_rate(&counts)
        );

        Ok(RunSummary {
            counts,
            output_path: output.to_path_buf(),
            summary_path,
        })
    }

    /// Load, initialize or resume, run, finalize.
    pub fn process_file(&self, input: &Path, output: &Path) -> anyhow::Result<RunSummary> {
        let mut table = self.load(input)?;
        self.initialize(&mut table, output);
        self.run(&mut table, output);
        self.finalize(&table, output)
    }
}
