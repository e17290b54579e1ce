//! Renderers over the aggregated buckets. Every exporter is a pure function
//! of a [`Report`]; none of them fetch, filter or reorder events.

pub mod chat;
pub mod csv;
pub mod format;
pub mod grouping;
pub mod json;
pub mod markdown;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike};
use chrono_tz::Tz;
use tracing::info;

use crate::aggregator::{Buckets, SourceSummary};
use crate::error::ExportError;
use crate::utils;

pub use self::chat::ChatExporter;
pub use self::csv::{CsvExporter, GroupedCsvExporter};
pub use self::json::JsonExporter;
pub use self::markdown::MarkdownExporter;

#[derive(Debug, Clone, Copy)]
pub struct Report<'a> {
    pub buckets: &'a Buckets,
    pub sources: &'a [SourceSummary],
    pub generated_at: DateTime<Tz>,
    pub city: &'a str,
}

impl<'a> Report<'a> {
    pub fn new(buckets: &'a Buckets, generated_at: DateTime<Tz>, city: &'a str) -> Self {
        Self {
            buckets,
            sources: &[],
            generated_at,
            city,
        }
    }

    pub fn with_sources(mut self, sources: &'a [SourceSummary]) -> Self {
        self.sources = sources;
        self
    }

    pub fn week(&self) -> u32 {
        self.generated_at.iso_week().week()
    }

    pub fn year(&self) -> i32 {
        self.generated_at.iso_week().year()
    }
}

pub trait Exporter {
    fn file_name(&self) -> &'static str;
    fn render(&self, report: &Report<'_>) -> Result<String, ExportError>;
}

pub fn all_exporters() -> Vec<Box<dyn Exporter>> {
    vec![
        Box::new(ChatExporter::default()),
        Box::new(JsonExporter),
        Box::new(CsvExporter),
        Box::new(GroupedCsvExporter),
        Box::new(MarkdownExporter),
    ]
}

/// Renders every format first, then writes them, so a render failure leaves
/// no partial set of files behind.
pub fn write_all(dir: &Path, report: &Report<'_>) -> Result<Vec<PathBuf>, ExportError> {
    let rendered = all_exporters()
        .iter()
        .map(|exporter| Ok((exporter.file_name(), exporter.render(report)?)))
        .collect::<Result<Vec<_>, ExportError>>()?;

    utils::ensure_dir(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(rendered.len());
    for (file_name, contents) in rendered {
        let path = dir.join(file_name);
        fs::write(&path, contents).map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "wrote export");
        written.push(path);
    }
    Ok(written)
}


#[cfg(test)]
mod tests {
    use super::fixtures;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn writes_every_format() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let out = tmp.path().join("output");
        let buckets = fixtures::buckets();
        let report = Report::new(&buckets, fixtures::now(), "Hannover");

        let written = write_all(&out, &report).expect("write");
        let names: Vec<_> = written
            .iter()
            .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                "latest_message.txt",
                "events.json",
                "events.csv",
                "events_grouped.csv",
                "weekly_digest.md",
            ]
        );
        assert!(written.iter().all(|path| path.is_file()));
    }

    #[test]
    fn week_comes_from_generation_time() {
        let buckets = Buckets::default();
        let report = Report::new(&buckets, fixtures::now(), "Hannover");
        assert_eq!(report.week(), 47);
        assert_eq!(report.year(), 2025);
    }
}
