use std::time::Duration;

use chrono::DateTime;
use chrono_tz::Tz;
use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::SourceError;
use crate::models::Event;
use crate::scraping::{ActiveSource, SourceDescriptor, SourceKind};

pub const WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    ThisWeek,
    Radar,
}

impl Bucket {
    pub const ALL: [Bucket; 2] = [Bucket::ThisWeek, Bucket::Radar];

    pub fn key(&self) -> &'static str {
        match self {
            Bucket::ThisWeek => "this_week",
            Bucket::Radar => "radar",
        }
    }
}

/// `[now, now + 7 days)` is this week; everything else, past included, is radar.
pub fn bucket_for(date: &DateTime<Tz>, now: &DateTime<Tz>) -> Bucket {
    let horizon = *now + chrono::Duration::days(WINDOW_DAYS);
    if date >= now && *date < horizon {
        Bucket::ThisWeek
    } else {
        Bucket::Radar
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Buckets {
    pub this_week: Vec<Event>,
    pub radar: Vec<Event>,
}

impl Buckets {
    pub fn categorize(events: Vec<Event>, now: &DateTime<Tz>) -> Self {
        let mut buckets = Buckets::default();
        for event in events {
            match bucket_for(&event.date, now) {
                Bucket::ThisWeek => buckets.this_week.push(event),
                Bucket::Radar => buckets.radar.push(event),
            }
        }
        sort_events(&mut buckets.this_week);
        sort_events(&mut buckets.radar);
        buckets
    }

    pub fn get(&self, bucket: Bucket) -> &[Event] {
        match bucket {
            Bucket::ThisWeek => &self.this_week,
            Bucket::Radar => &self.radar,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Bucket, &Event)> {
        Bucket::ALL
            .into_iter()
            .flat_map(move |bucket| self.get(bucket).iter().map(move |event| (bucket, event)))
    }

    pub fn len(&self) -> usize {
        self.this_week.len() + self.radar.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn sort_events(events: &mut [Event]) {
    events.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.title.cmp(&b.title)));
}

/// Keeps the first `max` events in the adapter's own order.
pub fn apply_cap(mut events: Vec<Event>, max: Option<usize>) -> Vec<Event> {
    if let Some(max) = max {
        events.truncate(max);
    }
    events
}

#[derive(Debug)]
pub struct SourceFailure {
    pub source: String,
    pub error: SourceError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub name: String,
    pub kind: SourceKind,
    pub fetched: usize,
    pub kept: usize,
    pub failed: bool,
}

/// Overall outcome of one aggregation, as reported in the run log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunHealth {
    NoSources,
    NoData,
    PartialFailure,
    Complete,
}

#[derive(Debug, Default)]
pub struct Aggregation {
    pub buckets: Buckets,
    pub failures: Vec<SourceFailure>,
    pub sources: Vec<SourceSummary>,
}

impl Aggregation {
    pub fn health(&self) -> RunHealth {
        if self.sources.is_empty() {
            RunHealth::NoSources
        } else if self.failures.is_empty() {
            RunHealth::Complete
        } else if self.buckets.is_empty() {
            RunHealth::NoData
        } else {
            RunHealth::PartialFailure
        }
    }

    pub fn log_summary(&self) -> RunHealth {
        let health = self.health();
        match health {
            RunHealth::NoSources => warn!("no sources enabled"),
            RunHealth::NoData => error!(
                failed = self.failures.len(),
                sources = self.sources.len(),
                "no sources produced data"
            ),
            RunHealth::PartialFailure => {
                let failed: Vec<&str> = self.failures.iter().map(|f| f.source.as_str()).collect();
                warn!(
                    failed = %failed.join(", "),
                    events = self.buckets.len(),
                    "some sources failed"
                );
            }
            RunHealth::Complete => info!(
                sources = self.sources.len(),
                this_week = self.buckets.this_week.len(),
                radar = self.buckets.radar.len(),
                "aggregation complete"
            ),
        }
        health
    }
}

async fn run_source(
    source: ActiveSource,
    limit: Duration,
) -> (SourceDescriptor, Result<Vec<Event>, SourceError>) {
    let ActiveSource { descriptor, scraper } = source;
    info!(source = %descriptor.name, "fetching");
    let handle = tokio::task::spawn_blocking(move || scraper.fetch());
    let result = match tokio::time::timeout(limit, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(SourceError::Crashed(join_err.to_string())),
        Err(_) => Err(SourceError::Timeout(limit)),
    };
    (descriptor, result)
}

/// Runs every source concurrently and waits for all of them before merging.
/// A failing source is recorded and never aborts the others.
pub async fn aggregate(
    sources: Vec<ActiveSource>,
    now: DateTime<Tz>,
    limit: Duration,
) -> Aggregation {
    let outcomes = join_all(
        sources
            .into_iter()
            .map(|source| run_source(source, limit)),
    )
    .await;

    let mut merged = Vec::new();
    let mut failures = Vec::new();
    let mut summaries = Vec::new();
    for (descriptor, result) in outcomes {
        match result {
            Ok(events) => {
                let fetched = events.len();
                let kept = apply_cap(events, descriptor.max_events);
                info!(source = %descriptor.name, fetched, kept = kept.len(), "source finished");
                summaries.push(SourceSummary {
                    name: descriptor.name.clone(),
                    kind: descriptor.kind,
                    fetched,
                    kept: kept.len(),
                    failed: false,
                });
                merged.extend(kept);
            }
            Err(err) => {
                warn!(
                    source = %descriptor.name,
                    kind = err.kind(),
                    error = %err,
                    "source failed"
                );
                summaries.push(SourceSummary {
                    name: descriptor.name.clone(),
                    kind: descriptor.kind,
                    fetched: 0,
                    kept: 0,
                    failed: true,
                });
                failures.push(SourceFailure {
                    source: descriptor.name,
                    error: err,
                });
            }
        }
    }

    Aggregation {
        buckets: Buckets::categorize(merged, &now),
        failures,
        sources: summaries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventCategory, TIMEZONE};
    use crate::scraping::VenueScraper;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    enum Behavior {
        Events(Vec<Event>),
        Fail,
        Sleep(Duration),
        Panic,
    }

    struct FakeSource {
        name: String,
        behavior: Behavior,
    }

    impl VenueScraper for FakeSource {
        fn name(&self) -> &str {
            &self.name
        }

        fn display_name(&self) -> &str {
            &self.name
        }

        fn venue_url(&self) -> &str {
            "https://example.invalid"
        }

        fn category(&self) -> SourceKind {
            SourceKind::Concert
        }

        fn fetch(&self) -> Result<Vec<Event>, SourceError> {
            match &self.behavior {
                Behavior::Events(events) => Ok(events.clone()),
                Behavior::Fail => Err(SourceError::parse(&self.name, "layout changed")),
                Behavior::Sleep(duration) => {
                    std::thread::sleep(*duration);
                    Ok(Vec::new())
                }
                Behavior::Panic => panic!("adapter bug"),
            }
        }
    }

    fn now() -> DateTime<Tz> {
        TIMEZONE.with_ymd_and_hms(2025, 11, 20, 12, 0, 0).unwrap()
    }

    fn event(title: &str, days: i64, hours: i64) -> Event {
        let date = now() + chrono::Duration::days(days) + chrono::Duration::hours(hours);
        Event::new(title, date, "Venue", EventCategory::Radar).unwrap()
    }

    fn source(name: &str, max_events: Option<usize>, behavior: Behavior) -> ActiveSource {
        ActiveSource {
            descriptor: SourceDescriptor {
                name: name.to_string(),
                kind: SourceKind::Concert,
                enabled: true,
                max_events,
            },
            scraper: Box::new(FakeSource {
                name: name.to_string(),
                behavior,
            }),
        }
    }

    #[tokio::test]
    async fn failing_source_does_not_sink_the_run() {
        let sources = vec![
            source("a", None, Behavior::Events(vec![event("A1", 1, 0), event("A2", 10, 0)])),
            source(
                "b",
                None,
                Behavior::Events(vec![event("B1", 2, 0), event("B2", 3, 0), event("B3", 40, 0)]),
            ),
            source("c", None, Behavior::Fail),
        ];
        let result = aggregate(sources, now(), Duration::from_secs(5)).await;

        assert_eq!(result.buckets.len(), 5);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].source, "c");
        assert_eq!(result.failures[0].error.kind(), "parse");
        assert_eq!(result.sources.len(), 3);
        assert!(result.sources.iter().any(|s| s.name == "c" && s.failed));
        assert_eq!(result.log_summary(), RunHealth::PartialFailure);
    }

    #[tokio::test]
    async fn caps_each_source_in_its_own_order() {
        let events = vec![event("Late", 5, 0), event("Early", 1, 0), event("Dropped", 2, 0)];
        let result = aggregate(
            vec![source("capped", Some(2), Behavior::Events(events))],
            now(),
            Duration::from_secs(5),
        )
        .await;
        let titles: Vec<_> = result.buckets.this_week.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Early", "Late"]);
        assert_eq!(result.sources[0].fetched, 3);
        assert_eq!(result.sources[0].kept, 2);
    }

    #[tokio::test]
    async fn slow_source_times_out() {
        let result = aggregate(
            vec![
                source("slow", None, Behavior::Sleep(Duration::from_millis(500))),
                source("fast", None, Behavior::Events(vec![event("Fast", 1, 0)])),
            ],
            now(),
            Duration::from_millis(50),
        )
        .await;
        assert_eq!(result.buckets.len(), 1);
        assert_eq!(result.failures.len(), 1);
        assert!(matches!(result.failures[0].error, SourceError::Timeout(_)));
    }

    #[tokio::test]
    async fn panicking_source_is_reported_as_crashed() {
        let result = aggregate(
            vec![source("buggy", None, Behavior::Panic)],
            now(),
            Duration::from_secs(5),
        )
        .await;
        assert_eq!(result.failures[0].error.kind(), "crashed");
        assert!(result.buckets.is_empty());
    }

    #[tokio::test]
    async fn all_sources_failing_yields_empty_buckets() {
        let result = aggregate(
            vec![source("x", None, Behavior::Fail), source("y", None, Behavior::Fail)],
            now(),
            Duration::from_secs(5),
        )
        .await;
        assert!(result.buckets.is_empty());
        assert_eq!(result.failures.len(), 2);
        assert_eq!(result.log_summary(), RunHealth::NoData);
    }

    #[tokio::test]
    async fn health_distinguishes_empty_and_clean_runs() {
        let empty = aggregate(Vec::new(), now(), Duration::from_secs(5)).await;
        assert_eq!(empty.health(), RunHealth::NoSources);

        let quiet = aggregate(
            vec![source("quiet", None, Behavior::Events(Vec::new()))],
            now(),
            Duration::from_secs(5),
        )
        .await;
        assert_eq!(quiet.health(), RunHealth::Complete);

        let clean = aggregate(
            vec![source("a", None, Behavior::Events(vec![event("A1", 1, 0)]))],
            now(),
            Duration::from_secs(5),
        )
        .await;
        assert_eq!(clean.log_summary(), RunHealth::Complete);
    }

    #[test]
    fn window_is_half_open() {
        let n = now();
        assert_eq!(bucket_for(&n, &n), Bucket::ThisWeek);
        assert_eq!(bucket_for(&(n + chrono::Duration::days(7)), &n), Bucket::Radar);
        assert_eq!(
            bucket_for(&(n + chrono::Duration::days(7) - chrono::Duration::seconds(1)), &n),
            Bucket::ThisWeek
        );
        assert_eq!(bucket_for(&(n - chrono::Duration::hours(1)), &n), Bucket::Radar);
    }

    #[test]
    fn buckets_partition_the_input() {
        let input = vec![
            event("Past", -2, 0),
            event("Now", 0, 0),
            event("Soon", 3, 0),
            event("Edge", 6, 23),
            event("Week", 7, 0),
            event("Far", 30, 0),
        ];
        let buckets = Buckets::categorize(input.clone(), &now());
        assert_eq!(buckets.len(), input.len());
        for original in &input {
            let in_week = buckets.this_week.contains(original);
            let in_radar = buckets.radar.contains(original);
            assert!(in_week ^ in_radar, "{} must be in exactly one bucket", original.title);
            assert_eq!(in_week, bucket_for(&original.date, &now()) == Bucket::ThisWeek);
        }
        let week: Vec<_> = buckets.this_week.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(week, vec!["Now", "Soon", "Edge"]);
    }

    #[test]
    fn sorts_by_date_then_title() {
        let input = vec![event("Zeta", 1, 0), event("Alpha", 1, 0), event("Early", 0, 1)];
        let buckets = Buckets::categorize(input, &now());
        let titles: Vec<_> = buckets.this_week.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Early", "Alpha", "Zeta"]);
        for pair in buckets.this_week.windows(2) {
            assert!((pair[0].date, &pair[0].title) <= (pair[1].date, &pair[1].title));
        }
    }
}
