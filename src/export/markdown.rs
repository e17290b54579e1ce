use super::format;
use super::grouping::{self, GroupedEvent};
use super::{Exporter, Report};
use crate::error::ExportError;
use crate::models::{Event, EventCategory};

const SYNOPSIS_LIMIT: usize = 300;

pub struct MarkdownExporter;

/// Table cells cannot contain a raw pipe.
fn cell(text: &str) -> String {
    text.replace('|', "\\|")
}

fn linked(title: &str, url: Option<&str>) -> String {
    match url {
        Some(url) => format!("[{}]({url})", cell(title)),
        None => cell(title),
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let cut: String = text.chars().take(limit).collect();
    format!("{}...", cut.trim_end())
}

fn film_section(lines: &mut Vec<String>, film: &GroupedEvent<'_>) {
    let first = film.first();
    lines.push(format!("#### {}", format::title_with_year(first)));
    lines.push(String::new());

    let mut details = format::movie_details(first);
    if let Some(country) = first.meta_text("country") {
        details.push(country.to_string());
    }
    if let Some(genres) = first.meta("genres").and_then(|value| value.as_list()) {
        details.push(genres.join(", "));
    }
    if !details.is_empty() {
        lines.push(format!("*{}*", details.join(" | ")));
        lines.push(String::new());
    }
    if let Some(synopsis) = first.meta_text("synopsis") {
        lines.push(format!("> {}", truncate_chars(synopsis, SYNOPSIS_LIMIT)));
        lines.push(String::new());
    }

    lines.push("| Date | Time | Language |".to_string());
    lines.push("|------|------|----------|".to_string());
    for showing in &film.showtimes {
        let language = showing
            .meta_text("language")
            .map(format::abbreviate_language)
            .unwrap_or_default();
        lines.push(format!(
            "| {} | {} | {} |",
            format::short_date(&showing.date),
            showing.time_label(),
            cell(&language)
        ));
    }
    lines.push(String::new());

    let mut links = Vec::new();
    if let Some(poster) = first.meta_text("poster_url") {
        links.push(format!("[Poster]({poster})"));
    }
    if let Some(trailer) = first.meta_text("trailer_url") {
        links.push(format!("[Trailer]({trailer})"));
    }
    if let Some(url) = film.url() {
        links.push(format!("[Tickets]({url})"));
    }
    if !links.is_empty() {
        lines.push(links.join(" | "));
        lines.push(String::new());
    }
}

fn event_table(lines: &mut Vec<String>, events: &[&Event], report: &Report<'_>) {
    lines.push("| Date | Event | Venue | Status |".to_string());
    lines.push("|------|-------|-------|--------|".to_string());
    for event in events {
        let status = match event.meta_text("status") {
            Some("sold_out") => "Sold Out",
            _ => "Available",
        };
        lines.push(format!(
            "| {} {} | {} | {} | {} |",
            format::long_date(&event.date, &report.generated_at),
            format::start_time(event),
            linked(&event.title, event.url.as_deref()),
            cell(&event.venue),
            status
        ));
    }
    lines.push(String::new());
}

impl Exporter for MarkdownExporter {
    fn file_name(&self) -> &'static str {
        "weekly_digest.md"
    }

    fn render(&self, report: &Report<'_>) -> Result<String, ExportError> {
        let buckets = report.buckets;
        let mut lines = vec![
            format!("# {} Week {} ({})", report.city, report.week(), report.year()),
            String::new(),
            format!(
                "*Generated: {}*",
                report.generated_at.format("%Y-%m-%d %H:%M")
            ),
            String::new(),
            "---".to_string(),
            String::new(),
            "## This Week".to_string(),
            String::new(),
        ];

        let films = grouping::group_films(&buckets.this_week);
        let showtimes: usize = films.iter().map(GroupedEvent::len).sum();
        lines.push("### Movies".to_string());
        lines.push(String::new());
        if films.is_empty() {
            lines.push("_No original-version screenings this week._".to_string());
            lines.push(String::new());
        } else {
            lines.push(format!(
                "**{} films** with **{showtimes} showtimes**",
                films.len()
            ));
            lines.push(String::new());
            for film in &films {
                film_section(&mut lines, film);
            }
        }

        let culture: Vec<&Event> = buckets
            .this_week
            .iter()
            .filter(|event| event.category != EventCategory::Movie)
            .collect();
        lines.push("### Culture & Concerts".to_string());
        lines.push(String::new());
        if culture.is_empty() {
            lines.push("_Nothing scheduled._".to_string());
            lines.push(String::new());
        } else {
            event_table(&mut lines, &culture, report);
        }

        lines.push("---".to_string());
        lines.push(String::new());
        lines.push("## On The Radar".to_string());
        lines.push(String::new());
        if buckets.radar.is_empty() {
            lines.push("_Nothing on the radar._".to_string());
            lines.push(String::new());
        } else {
            lines.push(format!("**{} upcoming events**", buckets.radar.len()));
            lines.push(String::new());
            let radar: Vec<&Event> = buckets.radar.iter().collect();
            event_table(&mut lines, &radar, report);
        }

        Ok(lines.join("\n"))
    }
}
