use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use scraper::{ElementRef, Html, Selector};
use tracing::info;

use super::base;
use super::{RegisteredScraper, SourceIdentity, SourceKind, VenueScraper};
use crate::config::SourceSettings;
use crate::error::{ConfigError, SourceError};
use crate::models::Event;

// rub=2 is the Livemusik category.
const URL: &str = "https://www.kulturzentrum-faust.de/veranstaltungen.html?rub=2";
const VENUE_NAME: &str = "Faust";
const ADDRESS: &str = "Zur Bettfedernfabrik 3, 30451 Hannover";
const LOCATIONS: [&str; 6] = [
    "60er-Jahre Halle",
    "Mephisto",
    "Warenannahme",
    "Kunsthalle",
    "Café",
    "Gretchen",
];

static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href*="/veranstaltungen/"]"#).expect("faust link"));
static IMAGE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("faust image"));
static DETAIL_HREF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/veranstaltungen/\w+/(\d{2})(\d{2})(\d{2})-[\w-]+\.html").expect("faust href regex")
});
static DATE_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\w{2},\s*\d{1,2}\.\d{1,2}\.\d{2}").expect("faust date line regex"));
static BEGINN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Beginn[:\s]*(\d{1,2})[:.](\d{2})").expect("faust beginn regex"));
static PRICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"VVK|\bAK\b|€").expect("faust price regex"));

pub struct Faust {
    identity: SourceIdentity,
}

#[derive(Debug, Default, PartialEq)]
struct ListingContent {
    title: Option<String>,
    start: Option<NaiveTime>,
    location: Option<String>,
    price: Option<String>,
}

impl VenueScraper for Faust {
    fn name(&self) -> &str {
        &self.identity.name
    }

    fn display_name(&self) -> &str {
        &self.identity.display_name
    }

    fn venue_url(&self) -> &str {
        &self.identity.url
    }

    fn category(&self) -> SourceKind {
        SourceKind::Concert
    }

    fn fetch(&self) -> Result<Vec<Event>, SourceError> {
        let html = base::fetch_html(&self.identity.url)?;
        let events = self.parse_document(&html)?;
        info!(source = %self.identity.name, count = events.len(), "parsed events");
        Ok(events)
    }
}

impl RegisteredScraper for Faust {
    const KIND: SourceKind = SourceKind::Concert;
    const MAX_EVENTS: Option<usize> = Some(20);

    fn from_settings(name: &str, settings: &SourceSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            identity: SourceIdentity::new(name, settings, VENUE_NAME, URL),
        })
    }
}

impl Faust {
    /// Detail links carry the date as `DDMMYY` in the file name, e.g.
    /// `/veranstaltungen/november/211125-le-fly.html`.
    pub(crate) fn parse_document(&self, html: &str) -> Result<Vec<Event>, SourceError> {
        let document = Html::parse_document(html);
        let mut seen = Vec::new();
        let mut links = Vec::new();
        for link in document.select(&LINK_SELECTOR) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            if DETAIL_HREF_RE.is_match(href) && !seen.contains(&href) {
                seen.push(href);
                links.push((href, link));
            }
        }
        if links.is_empty() {
            return Err(SourceError::parse(
                &self.identity.name,
                "no event detail links on page",
            ));
        }

        Ok(links
            .into_iter()
            .filter_map(|(href, link)| self.parse_link(href, link))
            .collect())
    }

    fn parse_link(&self, href: &str, link: ElementRef<'_>) -> Option<Event> {
        let date = date_from_href(href)?;
        let content = parse_lines(&base::text_lines(link));
        let title = content.title?;
        let start = base::localize(date.and_time(content.start.unwrap_or(base::DEFAULT_START)))?;

        let url = base::absolute_url(&self.identity.url, Some(href.to_string()));
        let image_url = link
            .select(&IMAGE_SELECTOR)
            .next()
            .and_then(|img| img.value().attr("src").or_else(|| img.value().attr("data-src")))
            .and_then(|src| base::absolute_url(&self.identity.url, Some(src.to_string())))
            .unwrap_or_default();

        let event = Event::new(
            &title,
            start,
            &self.identity.display_name,
            Self::KIND.default_category(),
        )?;
        let time = event.time_label();
        Some(
            event
                .with_url(url)
                .with_meta("time", time)
                .with_meta("location", content.location.unwrap_or_default())
                .with_meta("price", content.price.unwrap_or_default())
                .with_meta("event_type", "concert")
                .with_meta("image_url", image_url)
                .with_meta("address", ADDRESS),
        )
    }
}

fn date_from_href(href: &str) -> Option<NaiveDate> {
    let caps = DETAIL_HREF_RE.captures(href)?;
    let day = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(2000 + year, month, day)
}

fn captured_time(caps: &Captures<'_>) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, 0)
}

fn parse_lines(lines: &[String]) -> ListingContent {
    let mut content = ListingContent::default();
    let mut doors = None;
    for line in lines {
        if DATE_LINE_RE.is_match(line) {
            continue;
        }
        if let Some(caps) = BEGINN_RE.captures(line) {
            content.start = captured_time(&caps);
            continue;
        }
        if line.contains("Einlass") || line.contains("Beginn") {
            doors = doors.or_else(|| base::parse_clock(line));
            continue;
        }
        if PRICE_RE.is_match(line) {
            content.price = Some(line.clone());
            continue;
        }
        if LOCATIONS.iter().any(|location| line.contains(location)) {
            content.location = Some(line.clone());
            continue;
        }
        if content.title.is_none() && line.chars().count() > 3 {
            content.title = Some(line.clone());
        }
    }
    content.start = content.start.or(doors);
    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE_HTML: &str = r#"
    <html><body>
      <div class="events">
        <a href="/veranstaltungen/november/211125-le-fly.html">
          <img src="/files/le-fly.jpg">
          <span>Fr, 21.11.25</span>
          <strong>Le Fly</strong>
          <span>St. Pauli Hip-Hop-Punk</span>
          <span>60er-Jahre Halle</span>
          <span>VVK 25€ / AK 32€</span>
          <span>Einlass: 18:30 Uhr / Beginn: 19:30 Uhr</span>
        </a>
        <a href="/veranstaltungen/november/211125-le-fly.html">Mehr Infos</a>
        <a href="/veranstaltungen/dezember/051225-kaffee-und-krach.html">
          <span>Fr, 05.12.25</span>
          <strong>Kaffee &amp; Krach</strong>
          <span>Mephisto</span>
          <span>Einlass 20.00 Uhr</span>
        </a>
        <a href="/veranstaltungen.html?rub=3">Ausstellungen</a>
      </div>
    </body></html>
    "#;

    fn scraper() -> Faust {
        Faust::from_settings("faust_hannover", &SourceSettings::default()).expect("construct")
    }

    #[test]
    fn parses_detail_links_once() {
        let events = scraper().parse_document(SAMPLE_HTML).expect("parse");
        let titles: Vec<_> = events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Le Fly", "Kaffee & Krach"]);
    }

    #[test]
    fn reads_date_from_url_and_details_from_lines() {
        let events = scraper().parse_document(SAMPLE_HTML).expect("parse");
        let fly = &events[0];
        assert_eq!(fly.date.to_rfc3339(), "2025-11-21T19:30:00+01:00");
        assert_eq!(
            fly.url.as_deref(),
            Some("https://www.kulturzentrum-faust.de/veranstaltungen/november/211125-le-fly.html")
        );
        assert_eq!(fly.meta_text("location"), Some("60er-Jahre Halle"));
        assert_eq!(fly.meta_text("price"), Some("VVK 25€ / AK 32€"));
        assert_eq!(
            fly.meta_text("image_url"),
            Some("https://www.kulturzentrum-faust.de/files/le-fly.jpg")
        );

        let krach = &events[1];
        assert_eq!(krach.date.to_rfc3339(), "2025-12-05T20:00:00+01:00");
        assert_eq!(krach.meta_text("location"), Some("Mephisto"));
        assert!(krach.meta("price").is_none());
    }

    #[test]
    fn page_without_detail_links_is_a_parse_error() {
        let html = r#"<a href="/veranstaltungen.html?rub=2">Livemusik</a>"#;
        assert!(scraper().parse_document(html).is_err());
    }
}
