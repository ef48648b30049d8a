use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Local};

use crate::bookmarks::StatusCounts;

/// `<dir>/<stem>_summary.txt` next to the output table.
pub fn summary_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "bookmarks".to_string());
    output.with_file_name(format!("{stem}_summary.txt"))
}

pub fn success_rate(counts: &StatusCounts) -> f64 {
    if counts.total == 0 {
        return 0.0;
    }
    counts.completed as f64 / counts.total as f64 * 100.0
}

pub fn render(counts: &StatusCounts, generated_at: DateTime<Local>) -> String {
    format!(
        "Bookmark Processing Summary\n\
         ============================\n\
         Total bookmarks: {}\n\
         Successfully processed: {}\n\
         Failed: {}\n\
         Success rate: {:.1}%\n\
         \n\
         Generated at: {}\n",
        counts.total,
        counts.completed,
        counts.failed,
        success_rate(counts),
        generated_at.format("%Y-%m-%d %H:%M:%S"),
    )
}

pub fn write_summary(output: &Path, counts: &StatusCounts) -> anyhow::Result<PathBuf> {
    let path = summary_path(output);
    std::fs::write(&path, render(counts, Local::now()))
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
