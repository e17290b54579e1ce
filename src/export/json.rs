use serde::Serialize;

use super::format;
use super::grouping::{self, GroupedEvent};
use super::{Exporter, Report};
use crate::aggregator::SourceSummary;
use crate::error::ExportError;
use crate::models::{Event, MetaValue};

const MAX_CAST: usize = 5;

pub struct JsonExporter;

#[derive(Serialize)]
struct Document<'a> {
    meta: Meta<'a>,
    this_week: Vec<EventRecord<'a>>,
    radar: Vec<EventRecord<'a>>,
    films: Vec<FilmRecord<'a>>,
}

#[derive(Serialize)]
struct Meta<'a> {
    city: &'a str,
    week: u32,
    year: i32,
    generated_at: String,
    total_events: usize,
    this_week_count: usize,
    radar_count: usize,
    sources: &'a [SourceSummary],
}

#[derive(Serialize)]
struct EventRecord<'a> {
    id: String,
    #[serde(flatten)]
    event: &'a Event,
}

#[derive(Serialize)]
struct FilmRecord<'a> {
    title: &'a str,
    year: Option<i64>,
    duration_min: Option<i64>,
    rating: Option<String>,
    country: Option<&'a str>,
    genres: &'a [String],
    synopsis: Option<&'a str>,
    poster_url: Option<&'a str>,
    trailer_url: Option<&'a str>,
    cast: &'a [String],
    ticket_url: Option<&'a str>,
    venue: &'a str,
    showtimes: Vec<ShowtimeRecord>,
}

#[derive(Serialize)]
struct ShowtimeRecord {
    date: String,
    time: String,
    language: String,
}

fn record(event: &Event) -> EventRecord<'_> {
    EventRecord {
        id: event.id(),
        event,
    }
}

fn film<'a>(group: &GroupedEvent<'a>) -> FilmRecord<'a> {
    let first = group.first();
    let list = |key: &str| first.meta(key).and_then(MetaValue::as_list).unwrap_or(&[]);
    let cast = list("cast");
    FilmRecord {
        title: group.title(),
        year: first.meta_int("year"),
        duration_min: first.meta_int("duration"),
        rating: first.meta_int("rating").map(format::format_rating),
        country: first.meta_text("country"),
        genres: list("genres"),
        synopsis: first.meta_text("synopsis"),
        poster_url: first.meta_text("poster_url"),
        trailer_url: first.meta_text("trailer_url"),
        cast: &cast[..cast.len().min(MAX_CAST)],
        ticket_url: group.url(),
        venue: group.venue(),
        showtimes: group
            .showtimes
            .iter()
            .map(|event| ShowtimeRecord {
                date: event.date.format("%Y-%m-%d").to_string(),
                time: event.time_label(),
                language: event
                    .meta_text("language")
                    .map(format::abbreviate_language)
                    .unwrap_or_default(),
            })
            .collect(),
    }
}

impl Exporter for JsonExporter {
    fn file_name(&self) -> &'static str {
        "events.json"
    }

    fn render(&self, report: &Report<'_>) -> Result<String, ExportError> {
        let buckets = report.buckets;
        let films = grouping::group_films(&buckets.this_week);
        let document = Document {
            meta: Meta {
                city: report.city,
                week: report.week(),
                year: report.year(),
                generated_at: report.generated_at.to_rfc3339(),
                total_events: buckets.len(),
                this_week_count: buckets.this_week.len(),
                radar_count: buckets.radar.len(),
                sources: report.sources,
            },
            this_week: buckets.this_week.iter().map(record).collect(),
            radar: buckets.radar.iter().map(record).collect(),
            films: films.iter().map(film).collect(),
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::Buckets;
    use crate::export::fixtures;
    use crate::scraping::SourceKind;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn render(buckets: &Buckets, sources: &[SourceSummary]) -> Value {
        let report = Report::new(buckets, fixtures::now(), "Hannover").with_sources(sources);
        let text = JsonExporter.render(&report).expect("render");
        serde_json::from_str(&text).expect("valid json")
    }

    #[test]
    fn empty_buckets_are_still_a_document() {
        let doc = render(&Buckets::default(), &[]);
        assert_eq!(doc["this_week"], Value::Array(vec![]));
        assert_eq!(doc["radar"], Value::Array(vec![]));
        assert_eq!(doc["films"], Value::Array(vec![]));
        assert_eq!(doc["meta"]["total_events"], 0);
    }

    #[test]
    fn events_carry_id_iso_date_and_inline_metadata() {
        let buckets = fixtures::buckets();
        let sources = vec![SourceSummary {
            name: "astor_hannover".into(),
            kind: SourceKind::Cinema,
            fetched: 1,
            kept: 1,
            failed: false,
        }];
        let doc = render(&buckets, &sources);

        let wicked = &doc["this_week"][0];
        assert_eq!(wicked["title"], "Wicked");
        assert_eq!(wicked["date"], "2025-11-22T19:30:00+01:00");
        assert_eq!(wicked["metadata"]["duration"], 137);
        assert_eq!(wicked["id"], Value::String(buckets.this_week[0].id()));
        assert_eq!(doc["radar"][0]["venue"], "ZAG Arena");
        assert_eq!(doc["meta"]["week"], 47);
        assert_eq!(doc["meta"]["sources"][0]["name"], "astor_hannover");
        assert_eq!(doc["meta"]["sources"][0]["kind"], "cinema");
    }

    #[test]
    fn films_group_showtimes() {
        let mut buckets = fixtures::buckets();
        let mut second = fixtures::wicked();
        second.date = second.date + chrono::Duration::days(1);
        buckets.this_week.push(
            second.with_meta("language", "Sprache: Englisch, Untertitel: Deutsch"),
        );
        let doc = render(&buckets, &[]);

        let films = doc["films"].as_array().expect("films");
        assert_eq!(films.len(), 1);
        assert_eq!(films[0]["duration_min"], 137);
        let showtimes = films[0]["showtimes"].as_array().expect("showtimes");
        assert_eq!(showtimes.len(), 2);
        assert_eq!(showtimes[1]["date"], "2025-11-23");
        assert_eq!(showtimes[1]["language"], "EN, UT:DE");
    }
}
