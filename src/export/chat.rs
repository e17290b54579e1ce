//! Telegram message in legacy Markdown.

use super::format;
use super::{Exporter, Report};
use crate::error::ExportError;
use crate::models::{Event, EventCategory};

/// Telegram counts message length in UTF-16 code units.
pub const MESSAGE_LIMIT: usize = 4096;
pub const TRUNCATION_MARKER: &str = "\n\n… (truncated)";

pub const MOVIES_HEADING: &str = "🎬 *Movies (This Week)*";
pub const CULTURE_HEADING: &str = "🎭 *Culture & Concerts (This Week)*";
pub const RADAR_HEADING: &str = "🔭 *On The Radar*";

#[derive(Debug, Clone, Copy)]
pub struct ChatExporter {
    limit: usize,
}

impl Default for ChatExporter {
    fn default() -> Self {
        Self {
            limit: MESSAGE_LIMIT,
        }
    }
}

impl Exporter for ChatExporter {
    fn file_name(&self) -> &'static str {
        "latest_message.txt"
    }

    fn render(&self, report: &Report<'_>) -> Result<String, ExportError> {
        Ok(self.message(report))
    }
}

impl ChatExporter {
    pub fn with_limit(limit: usize) -> Self {
        Self { limit }
    }

    pub fn message(&self, report: &Report<'_>) -> String {
        fit_blocks(&blocks(report), self.limit)
    }
}

/// Each block is kept or dropped whole when the message is cut.
fn blocks(report: &Report<'_>) -> Vec<String> {
    let (movies, culture): (Vec<&Event>, Vec<&Event>) = report
        .buckets
        .this_week
        .iter()
        .partition(|event| event.category == EventCategory::Movie);

    let mut blocks = vec![format!(
        "*{} Week {}*",
        escape(report.city),
        report.week()
    )];

    blocks.push(format!("\n{MOVIES_HEADING}"));
    if movies.is_empty() {
        blocks.push("_No OV movies this week_".to_string());
    }
    let mut current_day = String::new();
    for movie in movies {
        let day = format::short_date(&movie.date);
        if day != current_day {
            blocks.push(format!("\n📅 *{day}*"));
            current_day = day;
        }
        blocks.push(movie_entry(movie));
    }

    blocks.push(format!("\n{CULTURE_HEADING}"));
    if culture.is_empty() {
        blocks.push("_No culture events this week_".to_string());
    }
    for event in culture {
        blocks.push(format!(
            "• {}\n  {} {} @ {}",
            bold(&event.title),
            format::short_date(&event.date),
            format::start_time(event),
            escape(&event.venue)
        ));
    }

    blocks.push(format!("\n{RADAR_HEADING}"));
    if report.buckets.radar.is_empty() {
        blocks.push("_Nothing on the radar_".to_string());
    }
    for event in &report.buckets.radar {
        blocks.push(format!(
            "• {}\n  {} | {} @ {}",
            bold(&event.title),
            format::long_date(&event.date, &report.generated_at),
            format::start_time(event),
            escape(&event.venue)
        ));
    }

    blocks
}

fn movie_entry(event: &Event) -> String {
    let mut lines = vec![format!("• {}", bold(&format::title_with_year(event)))];
    let details = format::movie_details(event);
    if !details.is_empty() {
        lines.push(format!("  _{}_", details.join(" • ")));
    }
    let time = event.time_label();
    match event.meta_text("language").map(format::abbreviate_language) {
        Some(language) if !language.is_empty() => {
            lines.push(format!("  ⏰ {time} ({})", escape(&language)))
        }
        _ => lines.push(format!("  ⏰ {time}")),
    }
    lines.join("\n")
}

fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Section and day headings start with a blank line.
fn is_heading(block: &str) -> bool {
    block.starts_with('\n')
}

fn fit_blocks(blocks: &[String], limit: usize) -> String {
    let full = blocks.join("\n");
    if utf16_len(&full) <= limit {
        return full;
    }

    let budget = limit.saturating_sub(utf16_len(TRUNCATION_MARKER));
    let mut kept: Vec<&str> = Vec::new();
    let mut used = 0;
    for block in blocks {
        let separator = usize::from(!kept.is_empty());
        let cost = separator + utf16_len(block);
        if used + cost > budget {
            break;
        }
        kept.push(block);
        used += cost;
    }
    while kept.last().is_some_and(|block| is_heading(block)) {
        kept.pop();
    }

    let mut message = kept.join("\n");
    message.push_str(TRUNCATION_MARKER);
    message
}

/// Outside entities the legacy parser accepts a backslash before its markers.
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Escapes are not allowed inside an entity, so a stray `*` is dropped.
fn bold(text: &str) -> String {
    format!("*{}*", text.replace('*', ""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::Buckets;
    use crate::export::fixtures;
    use crate::models::TIMEZONE;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_movies_and_radar_sections_in_order() {
        let buckets = fixtures::buckets();
        let report = Report::new(&buckets, fixtures::now(), "Hannover");
        let message = ChatExporter::default().message(&report);

        let movies = message.find(MOVIES_HEADING).expect("movies heading");
        let wicked = message.find("Wicked").expect("wicked");
        let radar = message.find(RADAR_HEADING).expect("radar heading");
        let luciano = message.find("Luciano").expect("luciano");
        assert!(movies < wicked && wicked < radar && radar < luciano);
        assert!(message.starts_with("*Hannover Week 47*"));
    }

    #[test]
    fn renders_full_message() {
        let buckets = fixtures::buckets();
        let report = Report::new(&buckets, fixtures::now(), "Hannover");
        let expected = "*Hannover Week 47*\n\
            \n🎬 *Movies (This Week)*\n\
            \n📅 *Sa 22.11.*\n\
            • *Wicked*\n  _2h17m_\n  ⏰ 19:30\n\
            \n🎭 *Culture & Concerts (This Week)*\n\
            _No culture events this week_\n\
            \n🔭 *On The Radar*\n\
            • *Luciano*\n  Sa, 29. Nov | 20:00 @ ZAG Arena";
        assert_eq!(ChatExporter::default().message(&report), expected);
    }

    #[test]
    fn empty_sections_get_placeholders() {
        let buckets = Buckets::default();
        let report = Report::new(&buckets, fixtures::now(), "Hannover");
        let message = ChatExporter::default().message(&report);
        assert!(message.contains("_No OV movies this week_"));
        assert!(message.contains("_No culture events this week_"));
        assert!(message.contains("_Nothing on the radar_"));
    }

    #[test]
    fn long_messages_are_cut_at_block_boundaries() {
        let start = TIMEZONE.with_ymd_and_hms(2025, 12, 1, 20, 0, 0).unwrap();
        let radar = (0..200)
            .map(|i| {
                Event::new(
                    &format!("Touring Band Number {i:03}"),
                    start + Duration::days(i),
                    "Swiss Life Hall",
                    EventCategory::Radar,
                )
                .unwrap()
            })
            .collect();
        let buckets = Buckets {
            this_week: Vec::new(),
            radar,
        };
        let report = Report::new(&buckets, fixtures::now(), "Hannover");
        let message = ChatExporter::default().message(&report);

        assert!(utf16_len(&message) <= MESSAGE_LIMIT);
        assert!(message.ends_with(TRUNCATION_MARKER));
        let body = message.trim_end_matches(TRUNCATION_MARKER);
        assert!(body.ends_with("@ Swiss Life Hall"), "cut mid-entry: {body:?}");
    }

    #[test]
    fn cut_never_ends_on_a_bare_heading() {
        let blocks = vec![
            "*Hannover Week 47*".to_string(),
            format!("\n{CULTURE_HEADING}"),
            "• *Faust*\n  Fr 21.11. 19:30 @ Opernhaus".to_string(),
            format!("\n{RADAR_HEADING}"),
            "• *Luciano*\n  Sa, 29. Nov | 20:00 @ ZAG Arena".to_string(),
        ];
        let through_radar_heading = blocks[..4].join("\n");
        let limit = utf16_len(&through_radar_heading) + utf16_len(TRUNCATION_MARKER) + 2;

        let message = fit_blocks(&blocks, limit);
        assert!(!message.contains(RADAR_HEADING), "{message:?}");
        assert_eq!(
            message,
            format!("{}{TRUNCATION_MARKER}", blocks[..3].join("\n"))
        );
    }

    #[test]
    fn short_messages_are_untouched() {
        let buckets = fixtures::buckets();
        let report = Report::new(&buckets, fixtures::now(), "Hannover");
        let message = ChatExporter::default().message(&report);
        assert!(!message.contains("(truncated)"));
    }

    #[test]
    fn language_and_metadata_lines() {
        let date = TIMEZONE.with_ymd_and_hms(2025, 11, 24, 21, 0, 0).unwrap();
        let event = Event::new("Chainsaw Man", date, "Astor", EventCategory::Movie)
            .unwrap()
            .with_meta("year", 2025_i64)
            .with_meta("duration", 100_i64)
            .with_meta("rating", 16_i64)
            .with_meta("language", "Sprache: Japanisch, Untertitel: Deutsch");
        assert_eq!(
            movie_entry(&event),
            "• *Chainsaw Man (2025)*\n  _1h40m • FSK16_\n  ⏰ 21:00 (JP, UT:DE)"
        );
    }

    #[test]
    fn markdown_markers_are_neutralized() {
        assert_eq!(escape("a_b*c"), "a\\_b\\*c");
        assert_eq!(bold("**Stars**"), "*Stars*");
    }
}
