use std::time::Duration;

use chrono::{
    DateTime, Datelike, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use crate::error::{ClassificationAmbiguity, ConfigError, SourceError};
use crate::models::TIMEZONE;

const HTTP_TIMEOUT: Duration = Duration::from_secs(20);
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";

/// Venues that publish a date without a start time usually mean 8 PM.
pub const DEFAULT_START: NaiveTime = match NaiveTime::from_hms_opt(20, 0, 0) {
    Some(time) => time,
    None => panic!("20:00 is a valid time"),
};

static GERMAN_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})\.(\d{1,2})\.(\d{4})").expect("valid german date regex"));
static VENUE_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2})\.?\s*([A-Za-zÄÖÜäöü]{3,})\.?\s*(\d{4})").expect("valid venue date regex")
});
static UHR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})[:.](\d{2})\s*Uhr").expect("valid uhr regex"));
static CLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2}):(\d{2})\b").expect("valid clock regex"));

pub fn clean_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn first_text(element: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(inner_text)
        .filter(|text| !text.is_empty())
}

pub fn inner_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

/// Text nodes of `element`, each cleaned, empty ones dropped.
pub fn text_lines(element: ElementRef<'_>) -> Vec<String> {
    element
        .text()
        .map(clean_text)
        .filter(|line| !line.is_empty())
        .collect()
}

pub fn joined_text(element: ElementRef<'_>, separator: &str) -> String {
    text_lines(element).join(separator)
}

pub fn first_attr(element: &ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    element
        .select(selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(str::to_string)
}

pub fn absolute_url(base: &str, href: Option<String>) -> Option<String> {
    let href = href?;
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    let base_url = reqwest::Url::parse(base).ok()?;
    base_url.join(href).ok().map(|u| u.to_string())
}

/// Decodes entities and drops tags from an HTML snippet.
pub fn strip_markup(input: &str) -> String {
    let fragment = Html::parse_fragment(input);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    clean_text(&text).replace("[…]", "...")
}

pub fn compile_selector(source_name: &str, css: &str) -> Result<Selector, ConfigError> {
    Selector::parse(css).map_err(|err| ConfigError::InvalidSelector {
        source_name: source_name.to_string(),
        selector: css.to_string(),
        reason: err.to_string(),
    })
}

/// One GET with a fresh client; each adapter owns its session.
pub fn fetch_text(url: &str, headers: &[(&str, &str)]) -> Result<String, SourceError> {
    let fetch_err = |source: reqwest::Error| SourceError::Fetch {
        url: url.to_string(),
        source,
    };
    let client = Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(fetch_err)?;

    let mut request = client.get(url);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    let response = request.send().map_err(fetch_err)?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    response.text().map_err(fetch_err)
}

pub fn fetch_html(url: &str) -> Result<String, SourceError> {
    fetch_text(url, &[])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreeningVersion {
    Original,
    Dubbed,
}

const LOCAL_LANGUAGE: &str = "Deutsch";
const LANGUAGE_MARKER: &str = "Sprache:";
const SUBTITLE_MARKER: &str = "Untertitel:";
const KNOWN_LANGUAGES: [&str; 11] = [
    "Deutsch",
    "Englisch",
    "Japanisch",
    "Italienisch",
    "Spanisch",
    "Russisch",
    "Französisch",
    "Koreanisch",
    "Chinesisch",
    "Türkisch",
    "Polnisch",
];

/// Splits `Sprache: X, Untertitel: Y` into its spoken and subtitle parts.
fn split_descriptor(descriptor: &str) -> (&str, Option<&str>) {
    let (spoken, subtitles) = match descriptor.split_once(SUBTITLE_MARKER) {
        Some((spoken, subtitles)) => (spoken, Some(subtitles)),
        None => (descriptor, None),
    };
    let spoken = spoken.trim().trim_start_matches(LANGUAGE_MARKER);
    (trim_list(spoken), subtitles.map(trim_list))
}

fn trim_list(part: &str) -> &str {
    part.trim().trim_matches([',', ';']).trim()
}

/// German audio counts as original only when subtitles in another language
/// are burned in; any other spoken language is original.
pub fn classify_screening(descriptor: &str) -> Result<ScreeningVersion, ClassificationAmbiguity> {
    let descriptor = descriptor.trim();
    let (spoken, subtitles) = split_descriptor(descriptor);
    let recognized = descriptor.contains(LANGUAGE_MARKER)
        || KNOWN_LANGUAGES.iter().any(|lang| spoken.contains(lang));
    if spoken.is_empty() || !recognized {
        return Err(ClassificationAmbiguity {
            descriptor: descriptor.to_string(),
        });
    }

    if !spoken.contains(LOCAL_LANGUAGE) {
        return Ok(ScreeningVersion::Original);
    }
    let foreign_subtitles = subtitles.is_some_and(|subtitles| {
        subtitles
            .split([',', '/'])
            .map(str::trim)
            .any(|lang| !lang.is_empty() && lang != LOCAL_LANGUAGE)
    });
    if foreign_subtitles {
        Ok(ScreeningVersion::Original)
    } else {
        Ok(ScreeningVersion::Dubbed)
    }
}

/// Ambiguous descriptors are treated as dubbed and logged.
pub fn is_original_version(descriptor: &str) -> bool {
    match classify_screening(descriptor) {
        Ok(version) => version == ScreeningVersion::Original,
        Err(ambiguity) => {
            warn!(descriptor = %ambiguity.descriptor, "{ambiguity}, treating as dubbed");
            false
        }
    }
}

pub fn should_ignore(title: &str, keywords: &[String]) -> bool {
    let lowered = title.to_lowercase();
    keywords
        .iter()
        .any(|keyword| lowered.contains(&keyword.to_lowercase()))
}

pub fn german_month(name: &str) -> Option<u32> {
    let lowered = name.trim().trim_end_matches('.').to_lowercase();
    let month = match lowered.as_str() {
        "jan" | "januar" | "january" => 1,
        "feb" | "februar" | "february" => 2,
        "mär" | "märz" | "maerz" | "mrz" | "mar" | "march" => 3,
        "apr" | "april" => 4,
        "mai" | "may" => 5,
        "jun" | "juni" | "june" => 6,
        "jul" | "juli" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "okt" | "oktober" | "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dez" | "dezember" | "dec" | "december" => 12,
        _ => return None,
    };
    Some(month)
}

/// `19:30`, `19.30 Uhr`, `19:30 Uhr`. A bare `19.30` is ambiguous with dates
/// and only accepted with the `Uhr` suffix.
pub fn parse_clock(text: &str) -> Option<NaiveTime> {
    let caps = UHR_RE
        .captures(text)
        .or_else(|| CLOCK_RE.captures(text))?;
    let hour = caps.get(1)?.as_str().parse().ok()?;
    let minute = caps.get(2)?.as_str().parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// `2025-11-22T19:30:00`, `22.11.2025 19:30`, `Fr, 22.11.2025 | 19:30 Uhr`,
/// `20.11.2025`. Missing times fall back to [`DEFAULT_START`].
pub fn parse_german_date(input: &str) -> Option<NaiveDateTime> {
    let cleaned = clean_text(input);
    if cleaned.is_empty() {
        return None;
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%d.%m.%Y %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, fmt) {
            return Some(dt);
        }
    }
    for fmt in ["%Y-%m-%d", "%d.%m.%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, fmt) {
            return Some(date.and_time(DEFAULT_START));
        }
    }

    let caps = GERMAN_DATE_RE.captures(&cleaned)?;
    let day = caps.get(1)?.as_str().parse().ok()?;
    let month = caps.get(2)?.as_str().parse().ok()?;
    let year = caps.get(3)?.as_str().parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let rest = &cleaned[caps.get(0)?.end()..];
    let time = parse_clock(rest).unwrap_or(DEFAULT_START);
    Some(date.and_time(time))
}

/// Compact venue dates such as `AB22NOV2025` or `22. November 2025`.
pub fn parse_venue_date(input: &str) -> Option<NaiveDateTime> {
    let caps = VENUE_DATE_RE.captures(input)?;
    let day = caps.get(1)?.as_str().parse().ok()?;
    let month = german_month(caps.get(2)?.as_str())?;
    let year = caps.get(3)?.as_str().parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let rest = &input[caps.get(0)?.end()..];
    let time = parse_clock(rest).unwrap_or(DEFAULT_START);
    Some(date.and_time(time))
}

/// Offset-carrying ISO timestamps are converted; naive ones are read as
/// local wall-clock time.
pub fn parse_iso_datetime(input: &str) -> Option<DateTime<Tz>> {
    let trimmed = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&TIMEZONE));
    }
    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.with_timezone(&TIMEZONE));
    }
    parse_german_date(trimmed).and_then(localize)
}

/// For listings that print day and month only: the next occurrence on or
/// after `today`.
pub fn infer_year(month: u32, day: u32, today: NaiveDate) -> Option<NaiveDate> {
    let date = NaiveDate::from_ymd_opt(today.year(), month, day)?;
    if date < today {
        NaiveDate::from_ymd_opt(today.year() + 1, month, day)
    } else {
        Some(date)
    }
}

pub fn today() -> NaiveDate {
    Utc::now().with_timezone(&TIMEZONE).date_naive()
}

pub fn localize(naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match TIMEZONE.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(dt, _) => Some(dt),
        LocalResult::None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn naive(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, min, 0))
            .expect("valid test date")
    }

    #[test]
    fn keeps_original_versions_and_drops_dubs() {
        let cases = [
            ("Sprache: Englisch", ScreeningVersion::Original),
            ("Sprache: Japanisch, Untertitel: Deutsch", ScreeningVersion::Original),
            ("Sprache: Deutsch, Untertitel: Englisch", ScreeningVersion::Original),
            ("Sprache: Deutsch", ScreeningVersion::Dubbed),
            ("Sprache: Koreanisch", ScreeningVersion::Original),
            ("Englisch", ScreeningVersion::Original),
            ("Sprache: Deutsch, Untertitel: Deutsch", ScreeningVersion::Dubbed),
            ("Sprache: Deutsch, Untertitel:", ScreeningVersion::Dubbed),
            ("Sprache: Deutsch, Untertitel: Deutsch/Englisch", ScreeningVersion::Original),
        ];
        for (descriptor, expected) in cases {
            assert_eq!(classify_screening(descriptor), Ok(expected), "{descriptor}");
        }
    }

    // Missing or unrecognizable descriptors have no defined meaning upstream;
    // they are dropped rather than guessed.
    #[test]
    fn ambiguous_descriptors_are_flagged_and_dropped() {
        for descriptor in ["", "   ", "3D", "Atmos", "Untertitel: Englisch"] {
            assert!(classify_screening(descriptor).is_err(), "{descriptor:?}");
            assert!(!is_original_version(descriptor));
        }
    }

    #[test]
    fn classification_is_idempotent() {
        for descriptor in ["Sprache: Englisch", "Sprache: Deutsch", "", "Sprache: Deutsch, Untertitel: Englisch"] {
            assert_eq!(is_original_version(descriptor), is_original_version(descriptor));
            assert_eq!(classify_screening(descriptor), classify_screening(descriptor));
        }
    }

    #[test]
    fn parses_german_date_variants() {
        assert_eq!(parse_german_date("2025-11-22T19:30:00"), Some(naive(2025, 11, 22, 19, 30)));
        assert_eq!(parse_german_date("22.11.2025 19:30"), Some(naive(2025, 11, 22, 19, 30)));
        assert_eq!(parse_german_date("20.11.2025"), Some(naive(2025, 11, 20, 20, 0)));
        assert_eq!(
            parse_german_date("Fr, 22.11.2025 | 18.30 Uhr"),
            Some(naive(2025, 11, 22, 18, 30))
        );
        assert_eq!(parse_german_date("demnächst"), None);
        assert_eq!(parse_german_date("31.02.2025"), None);
    }

    #[test]
    fn parses_venue_dates() {
        assert_eq!(parse_venue_date("AB22NOV2025"), Some(naive(2025, 11, 22, 20, 0)));
        assert_eq!(parse_venue_date("03MÄR2026"), Some(naive(2026, 3, 3, 20, 0)));
        assert_eq!(
            parse_venue_date("Samstag 22. November 2025, 19:00"),
            Some(naive(2025, 11, 22, 19, 0))
        );
        assert_eq!(parse_venue_date("22 Blub 2025"), None);
    }

    #[test]
    fn clock_requires_colon_or_uhr() {
        assert_eq!(parse_clock("Beginn 19:30").map(|t| t.hour()), Some(19));
        assert_eq!(parse_clock("Einlass 18.30 Uhr").map(|t| t.minute()), Some(30));
        assert_eq!(parse_clock("am 22.11"), None);
        assert_eq!(parse_clock("25:00"), None);
    }

    #[test]
    fn iso_timestamps_keep_their_instant() {
        let dt = parse_iso_datetime("2025-11-22T19:00:00Z").expect("utc");
        assert_eq!(dt.hour(), 20);
        let dt = parse_iso_datetime("2025-11-22T20:00:00+01:00").expect("offset");
        assert_eq!(dt.hour(), 20);
        let dt = parse_iso_datetime("2025-11-22T20:00:00").expect("naive");
        assert_eq!(dt.hour(), 20);
    }

    #[test]
    fn localize_handles_dst_transitions() {
        assert!(localize(naive(2025, 3, 30, 2, 30)).is_none());
        let ambiguous = localize(naive(2025, 10, 26, 2, 30)).expect("ambiguous resolves");
        assert_eq!(ambiguous.to_rfc3339(), "2025-10-26T02:30:00+02:00");
    }

    #[test]
    fn infers_next_occurrence() {
        let today = NaiveDate::from_ymd_opt(2025, 11, 20).expect("date");
        assert_eq!(infer_year(12, 5, today), NaiveDate::from_ymd_opt(2025, 12, 5));
        assert_eq!(infer_year(1, 10, today), NaiveDate::from_ymd_opt(2026, 1, 10));
        assert_eq!(infer_year(11, 20, today), Some(today));
    }

    #[test]
    fn strips_markup_and_entities() {
        assert_eq!(
            strip_markup("<p>Rock &amp; Roll<br>Night</p> [&hellip;]"),
            "Rock & Roll Night ..."
        );
    }

    #[test]
    fn resolves_relative_links() {
        assert_eq!(
            absolute_url("https://www.capitol-hannover.de/events/", Some("/event/42".into())),
            Some("https://www.capitol-hannover.de/event/42".to_string())
        );
        assert_eq!(absolute_url("https://a.de/", Some("  ".into())), None);
    }

    #[test]
    fn ignore_keywords_are_case_insensitive() {
        let keywords = vec!["Führung".to_string(), "Workshop".to_string()];
        assert!(should_ignore("Öffentliche FÜHRUNG durchs Haus", &keywords));
        assert!(!should_ignore("Carmen", &keywords));
    }
}
