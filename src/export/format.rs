use chrono::{DateTime, Datelike};
use chrono_tz::Tz;

use crate::models::Event;

pub const GERMAN_DAYS: [&str; 7] = ["Mo", "Di", "Mi", "Do", "Fr", "Sa", "So"];
pub const GERMAN_MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mär", "Apr", "Mai", "Jun", "Jul", "Aug", "Sep", "Okt", "Nov", "Dez",
];

// Applied in order; the prefixes must go first.
const LANGUAGE_ABBREVIATIONS: [(&str, &str); 11] = [
    ("Sprache: ", ""),
    ("Untertitel: ", "UT:"),
    ("Englisch", "EN"),
    ("Japanisch", "JP"),
    ("Italienisch", "IT"),
    ("Spanisch", "ES"),
    ("Russisch", "RU"),
    ("Deutsch", "DE"),
    ("Französisch", "FR"),
    ("Koreanisch", "KR"),
    ("Chinesisch", "ZH"),
];

pub fn german_day(date: &DateTime<Tz>) -> &'static str {
    GERMAN_DAYS[date.weekday().num_days_from_monday() as usize]
}

pub fn german_month(date: &DateTime<Tz>) -> &'static str {
    GERMAN_MONTHS[date.month0() as usize]
}

/// `Sprache: Englisch, Untertitel: Deutsch` → `EN, UT:DE`.
pub fn abbreviate_language(language: &str) -> String {
    LANGUAGE_ABBREVIATIONS
        .iter()
        .fold(language.to_string(), |acc, (full, short)| acc.replace(full, short))
}

/// `137` → `2h17m`, `120` → `2h`, `45` → `45m`.
pub fn format_duration(minutes: i64) -> String {
    if minutes <= 0 {
        return String::new();
    }
    match (minutes / 60, minutes % 60) {
        (0, mins) => format!("{mins}m"),
        (hours, 0) => format!("{hours}h"),
        (hours, mins) => format!("{hours}h{mins}m"),
    }
}

pub fn format_rating(rating: i64) -> String {
    format!("FSK{rating}")
}

/// `Mo 24.11.`
pub fn short_date(date: &DateTime<Tz>) -> String {
    format!("{} {}", german_day(date), date.format("%d.%m."))
}

/// `Sa, 29. Nov`, with the year appended when it differs from `reference`.
pub fn long_date(date: &DateTime<Tz>, reference: &DateTime<Tz>) -> String {
    let base = format!("{}, {}. {}", german_day(date), date.day(), german_month(date));
    if date.year() == reference.year() {
        base
    } else {
        format!("{base} {}", date.year())
    }
}

/// Duration and age rating, whichever are known.
pub fn movie_details(event: &Event) -> Vec<String> {
    let mut parts = Vec::new();
    if let Some(duration) = event.meta_int("duration").filter(|d| *d > 0) {
        parts.push(format_duration(duration));
    }
    if let Some(rating) = event.meta_int("rating") {
        parts.push(format_rating(rating));
    }
    parts
}

/// Title with the release year when one is attached.
pub fn title_with_year(event: &Event) -> String {
    match event.meta_int("year") {
        Some(year) => format!("{} ({year})", event.title),
        None => event.title.clone(),
    }
}

pub fn start_time(event: &Event) -> String {
    event
        .meta_text("time")
        .map(str::to_string)
        .unwrap_or_else(|| event.time_label())
}
