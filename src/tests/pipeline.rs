use std::{cell::Cell, path::Path, rc::Rc};

use super::{long_text, CountingBackend, FakeSource};
use crate::ai::AiProcessor;
use crate::bookmarks::{BookmarkTable, Dialect, ProcessingStatus, PROCESSING_FAILED};
use crate::config::{DialectConfig, ProcessingConfig};
use crate::pipeline::{EnrichmentPipeline, PipelineOptions};

fn options(dialect: &DialectConfig, resume: bool, batch_size: usize) -> PipelineOptions {
    PipelineOptions {
        batch_size,
        resume,
        show_progress: false,
        extract_publisher: true,
        dialect: Dialect::from(dialect),
    }
}

fn pipeline(source: FakeSource, backend_calls: Rc<Cell<usize>>, options: PipelineOptions) -> EnrichmentPipeline {
    let processor = AiProcessor::new(
        &ProcessingConfig::default(),
        Box::new(CountingBackend {
            calls: backend_calls,
        }),
    );
    EnrichmentPipeline::new(Box::new(source), processor, options)
}

fn source() -> FakeSource {
    FakeSource::default()
        .with_page("https://a.com/1", "First Page", &long_text(5), "A")
        .with_page("https://b.com/2", "Second Page", &long_text(6), "")
        .with_page("https://c.com/3", "Third Page", &long_text(7), "C")
        .with_page("https://d.com/4", "Fourth Page", &long_text(8), "D")
}

fn write_input(dir: &Path, rows: &[&str]) -> std::path::PathBuf {
    let path = dir.join("bookmarks.csv");
    let mut content = String::from("url,title,tags\n");
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    std::fs::write(&path, content).unwrap();
    path
}

fn four_rows(dir: &Path) -> std::path::PathBuf {
    write_input(
        dir,
        &[
            "https://a.com/1,,rust",
            "https://b.com/2,My Own Title,",
            "https://c.com/3,https://c.com/3,NA",
            "https://d.com/4,,",
        ],
    )
}

#[test]
fn every_row_ends_terminal() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_input(
        tmp.path(),
        &[
            "https://a.com/1,,",
            "https://missing.com/x,Gone,",
            "ftp://a.com/file,Not Http,",
            "https://b.com/2,,",
        ],
    );
    let output = tmp.path().join("out.csv");

    let src = source();
    let calls = src.calls.clone();
    let p = pipeline(src, Rc::default(), options(&DialectConfig::csv(), false, 10));

    let mut table = p.load(&input).unwrap();
    p.initialize(&mut table, &output);
    p.run(&mut table, &output);

    assert!(table.records.iter().all(|r| r.status.is_terminal()));

    let statuses = table.records.iter().map(|r| r.status).collect::<Vec<_>>();
    assert_eq!(
        statuses,
        vec![
            ProcessingStatus::Completed,
            ProcessingStatus::Failed,
            ProcessingStatus::Failed,
            ProcessingStatus::Completed,
        ]
    );

    let gone = &table.records[1];
    assert_eq!(gone.description, "Could not access content from: Gone");
    assert_eq!(gone.author, "");
    assert_eq!(gone.formatted_title, "Gone");
    assert!(gone.ai_tags.is_empty());

    // invalid urls never reach the extractor
    assert_eq!(
        *calls.borrow(),
        vec!["https://a.com/1", "https://missing.com/x", "https://b.com/2"]
    );

    let summary = p.finalize(&table, &output).unwrap();
    assert_eq!(summary.counts.completed, 2);
    assert_eq!(summary.counts.failed, 2);

    let written = std::fs::read_to_string(&output).unwrap();
    assert!(written.starts_with("url,title,tags,description,ai_tags,author,formatted_title\n"));
    assert!(!written.contains("processing_status"));

    let report = std::fs::read_to_string(tmp.path().join("out_summary.txt")).unwrap();
    assert!(report.contains("Total bookmarks: 4\n"));
    assert!(report.contains("Success rate: 50.0%\n"));
}

#[test]
fn formatted_title_joins_title_and_publisher() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_input(tmp.path(), &["http://example.com/a,,"]);
    let output = tmp.path().join("out.csv");

    let src = FakeSource::default().with_page("http://example.com/a", "A Study", &"x".repeat(600), "Example");
    let p = pipeline(src, Rc::default(), options(&DialectConfig::csv(), false, 10));

    let summary = p.process_file(&input, &output).unwrap();
    assert_eq!(summary.counts.completed, 1);

    let table = BookmarkTable::load(&output).unwrap();
    let written = std::fs::read_to_string(&output).unwrap();
    assert!(written.contains(",A Study - Example"), "{written}");
    assert_eq!(table.records.len(), 1);
}

#[test]
fn effective_title_prefers_explicit_title() {
    let tmp = tempfile::tempdir().unwrap();
    let input = four_rows(tmp.path());
    let output = tmp.path().join("out.csv");

    let p = pipeline(source(), Rc::default(), options(&DialectConfig::csv(), false, 10));
    let mut table = p.load(&input).unwrap();
    p.run(&mut table, &output);

    let titles = table
        .records
        .iter()
        .map(|r| r.formatted_title.as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        titles,
        vec![
            "First Page - A",
            // no publisher found
            "My Own Title",
            // a title equal to the url is replaced
            "Third Page - C",
            "Fourth Page - D",
        ]
    );
    assert_eq!(table.records[0].ai_tags, vec!["first", "page"]);
}

#[test]
fn panicking_row_is_isolated() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_input(tmp.path(), &["https://panic.example/x,Boom,", "https://a.com/1,,"]);
    let output = tmp.path().join("out.csv");

    let p = pipeline(source(), Rc::default(), options(&DialectConfig::csv(), false, 10));
    let mut table = p.load(&input).unwrap();
    p.run(&mut table, &output);

    assert_eq!(table.records[0].status, ProcessingStatus::Failed);
    assert_eq!(table.records[0].description, PROCESSING_FAILED);
    assert_eq!(table.records[0].formatted_title, "Boom");
    assert_eq!(table.records[1].status, ProcessingStatus::Completed);
}

#[test]
fn checkpoints_keep_the_status_column() {
    let tmp = tempfile::tempdir().unwrap();
    let input = four_rows(tmp.path());
    let output = tmp.path().join("out.csv");

    let p = pipeline(source(), Rc::default(), options(&DialectConfig::csv(), false, 2));
    let mut table = p.load(&input).unwrap();
    p.run(&mut table, &output);

    // last checkpoint was after row 4; finalize has not run
    let (headers, rows) = Dialect::from(&DialectConfig::csv()).read(&output).unwrap();
    assert_eq!(headers.last().map(String::as_str), Some("processing_status"));
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| r.last().map(String::as_str) == Some("completed")));
}

#[test]
fn resume_after_complete_run_is_a_no_op() {
    for dialect in [DialectConfig::csv(), DialectConfig::tsv()] {
        let tmp = tempfile::tempdir().unwrap();
        let input = write_input(
            tmp.path(),
            &["https://a.com/1,,rust", "https://missing.com/x,Gone,", "https://c.com/3,,"],
        );
        let output = tmp.path().join("out");

        let backend_calls = Rc::new(Cell::new(0));
        let p = pipeline(source(), backend_calls.clone(), options(&dialect, false, 10));
        p.process_file(&input, &output).unwrap();
        assert_eq!(backend_calls.get(), 2);
        let first = std::fs::read(&output).unwrap();

        let src = source();
        let extract_calls = src.calls.clone();
        let backend_calls = Rc::new(Cell::new(0));
        let p = pipeline(src, backend_calls.clone(), options(&dialect, true, 10));
        let summary = p.process_file(&input, &output).unwrap();

        assert!(extract_calls.borrow().is_empty());
        assert_eq!(backend_calls.get(), 0);
        assert_eq!(summary.counts.completed, 2);
        assert_eq!(summary.counts.failed, 1);
        assert_eq!(std::fs::read(&output).unwrap(), first, "{dialect:?}");
    }
}

#[test]
fn resume_only_reprocesses_pending_rows() {
    let tmp = tempfile::tempdir().unwrap();
    let input = four_rows(tmp.path());
    let output = tmp.path().join("out.csv");
    let dialect = DialectConfig::csv();

    // an interrupted run: first batch of two done, checkpoint written
    let p = pipeline(source(), Rc::default(), options(&dialect, false, 2));
    let mut table = p.load(&input).unwrap();
    p.run(&mut table, &output);
    table.records[2..].iter_mut().for_each(|r| r.reset());
    p.checkpoint(&table, &output);
    let done_before = table.records[..2].to_vec();

    // different content now, so rewritten rows would show
    let src = FakeSource::default()
        .with_page("https://a.com/1", "Changed", &long_text(3), "Z")
        .with_page("https://b.com/2", "Changed", &long_text(3), "Z")
        .with_page("https://c.com/3", "Third Page", &long_text(7), "C")
        .with_page("https://d.com/4", "Fourth Page", &long_text(8), "D");
    let calls = src.calls.clone();
    let p = pipeline(src, Rc::default(), options(&dialect, true, 2));

    let mut table = p.load(&input).unwrap();
    p.initialize(&mut table, &output);
    assert_eq!(table.counts().pending, 2);
    p.run(&mut table, &output);

    assert_eq!(*calls.borrow(), vec!["https://c.com/3", "https://d.com/4"]);
    assert_eq!(table.records[..2], done_before[..]);
    assert!(table.records.iter().all(|r| r.status == ProcessingStatus::Completed));
}

#[test]
fn unreadable_previous_output_starts_fresh() {
    let tmp = tempfile::tempdir().unwrap();
    let input = four_rows(tmp.path());
    let output = tmp.path().join("out.csv");
    std::fs::write(&output, "something,else\n1,2\n").unwrap();

    let src = source();
    let calls = src.calls.clone();
    let p = pipeline(src, Rc::default(), options(&DialectConfig::csv(), true, 10));

    let summary = p.process_file(&input, &output).unwrap();
    assert_eq!(calls.borrow().len(), 4);
    assert_eq!(summary.counts.completed, 4);
}
