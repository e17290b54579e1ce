use std::collections::BTreeSet;

use super::format;
use super::grouping;
use super::{Exporter, Report};
use crate::aggregator::Bucket;
use crate::error::ExportError;
use crate::models::Event;

const BASE_COLUMNS: [&str; 6] = ["bucket", "title", "date", "venue", "category", "url"];
const GROUPED_COLUMNS: [&str; 7] = [
    "bucket",
    "title",
    "venue",
    "category",
    "url",
    "showtime_count",
    "showtimes",
];

/// One row per event; metadata keys become extra columns.
pub struct CsvExporter;

/// One row per title and venue in each bucket.
pub struct GroupedCsvExporter;

fn finish(writer: ::csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let bytes = writer
        .into_inner()
        .map_err(|err| ::csv::Error::from(err.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}

fn showtime_label(event: &Event) -> String {
    let stamp = event.date.format("%Y-%m-%d %H:%M");
    match event.meta_text("language").map(format::abbreviate_language) {
        Some(language) if !language.is_empty() => format!("{stamp} ({language})"),
        _ => stamp.to_string(),
    }
}

impl Exporter for CsvExporter {
    fn file_name(&self) -> &'static str {
        "events.csv"
    }

    fn render(&self, report: &Report<'_>) -> Result<String, ExportError> {
        let meta_keys: BTreeSet<&str> = report
            .buckets
            .iter()
            .flat_map(|(_, event)| event.metadata.keys().map(String::as_str))
            .filter(|key| !BASE_COLUMNS.contains(key))
            .collect();

        let mut writer = ::csv::Writer::from_writer(Vec::new());
        writer.write_record(BASE_COLUMNS.iter().copied().chain(meta_keys.iter().copied()))?;
        for (bucket, event) in report.buckets.iter() {
            let mut row = vec![
                bucket.key().to_string(),
                event.title.clone(),
                event.date.to_rfc3339(),
                event.venue.clone(),
                event.category.as_str().to_string(),
                event.url.clone().unwrap_or_default(),
            ];
            row.extend(meta_keys.iter().map(|key| {
                event
                    .meta(key)
                    .map(|value| value.to_display())
                    .unwrap_or_default()
            }));
            writer.write_record(&row)?;
        }
        finish(writer)
    }
}

impl Exporter for GroupedCsvExporter {
    fn file_name(&self) -> &'static str {
        "events_grouped.csv"
    }

    fn render(&self, report: &Report<'_>) -> Result<String, ExportError> {
        let mut writer = ::csv::Writer::from_writer(Vec::new());
        writer.write_record(GROUPED_COLUMNS)?;
        for bucket in Bucket::ALL {
            for group in grouping::group_by_title_venue(report.buckets.get(bucket)) {
                let showtimes: Vec<String> =
                    group.showtimes.iter().map(|event| showtime_label(event)).collect();
                let count = group.len().to_string();
                let joined = showtimes.join(" | ");
                writer.write_record([
                    bucket.key(),
                    group.title(),
                    group.venue(),
                    group.first().category.as_str(),
                    group.url().unwrap_or_default(),
                    count.as_str(),
                    joined.as_str(),
                ])?;
            }
        }
        finish(writer)
    }
}
