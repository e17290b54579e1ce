use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use super::base;
use super::{RegisteredScraper, SourceIdentity, SourceKind, VenueScraper};
use crate::config::SourceSettings;
use crate::error::{ConfigError, SourceError};
use crate::models::Event;

const URL: &str = "https://pavillon-hannover.de/programm";
const VENUE_NAME: &str = "Pavillon";
const ADDRESS: &str = "Lister Meile 4, 30161 Hannover";
const MAX_ANCESTORS: usize = 6;

const MUSIC_CATEGORIES: [&str; 3] = ["Konzert", "Festival", "Party"];
const OTHER_CATEGORIES: [&str; 3] = ["Lesung", "Comedy", "Börse"];
const CANCELLED_MARKERS: [&str; 4] = ["entfällt", "wird verschoben", "abgesagt", "cancelled"];

static DETAIL_LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href*="/event/details/"]"#).expect("pavillon link"));
static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,2}\.\d{1,2}\.\d{4}").expect("pavillon date regex"));
static BARE_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}\.\d{1,2}\.\d{4}$").expect("pavillon bare date regex"));

pub struct Pavillon {
    identity: SourceIdentity,
}

impl VenueScraper for Pavillon {
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

impl RegisteredScraper for Pavillon {
    const KIND: SourceKind = SourceKind::Concert;
    const MAX_EVENTS: Option<usize> = Some(20);

    fn from_settings(name: &str, settings: &SourceSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            identity: SourceIdentity::new(name, settings, VENUE_NAME, URL),
        })
    }
}

impl Pavillon {
    /// The program page has no stable card markup; each detail link is
    /// resolved to the nearest ancestor whose text carries a date.
    pub(crate) fn parse_document(&self, html: &str) -> Result<Vec<Event>, SourceError> {
        let document = Html::parse_document(html);
        let links: Vec<_> = document.select(&DETAIL_LINK_SELECTOR).collect();
        if links.is_empty() {
            return Err(SourceError::parse(
                &self.identity.name,
                "no /event/details/ links on page",
            ));
        }

        let mut seen = HashSet::new();
        let mut events = Vec::new();
        for link in links {
            let Some(href) = link.value().attr("href").filter(|href| !href.is_empty()) else {
                continue;
            };
            if !seen.insert(href) {
                continue;
            }
            let Some(text) = listing_text(link) else {
                continue;
            };
            if !MUSIC_CATEGORIES.iter().any(|cat| text.contains(cat)) {
                continue;
            }
            let lowered = text.to_lowercase();
            if CANCELLED_MARKERS.iter().any(|marker| lowered.contains(marker)) {
                debug!(source = %self.identity.name, href, "skipping cancelled event");
                continue;
            }
            if let Some(event) = self.parse_listing(href, &text) {
                events.push(event);
            }
        }
        Ok(events)
    }

    fn parse_listing(&self, href: &str, text: &str) -> Option<Event> {
        let start = base::parse_german_date(text).and_then(base::localize)?;
        let title = extract_title(text)?;
        let genre = MUSIC_CATEGORIES
            .iter()
            .find(|cat| text.contains(*cat))
            .copied()
            .unwrap_or("Konzert");
        let url = base::absolute_url(&self.identity.url, Some(href.to_string()));

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
                .with_meta("genre", genre)
                .with_meta("event_type", "concert")
                .with_meta("address", ADDRESS),
        )
    }
}

fn listing_text(link: ElementRef<'_>) -> Option<String> {
    link.ancestors()
        .filter_map(ElementRef::wrap)
        .take(MAX_ANCESTORS)
        .map(|el| base::joined_text(el, " | "))
        .find(|text| DATE_RE.is_match(text))
}

/// First substantial segment after the `Uhr` segment, skipping category
/// labels and bare dates.
fn extract_title(text: &str) -> Option<String> {
    text.split('|')
        .map(str::trim)
        .skip_while(|part| !part.contains("Uhr"))
        .filter(|part| !part.contains("Uhr"))
        .filter(|part| *part != "Tickets")
        .filter(|part| !MUSIC_CATEGORIES.contains(part) && !OTHER_CATEGORIES.contains(part))
        .filter(|part| !BARE_DATE_RE.is_match(part))
        .find(|part| part.chars().count() >= 3)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE_HTML: &str = r#"
    <html><body>
      <ul class="program">
        <li>
          <div class="meta"><span>Sa</span><span>22.11.2025</span><span>18:30 Uhr</span></div>
          <div class="body">
            <span>Konzert</span>
            <h2><a href="/event/details/4711">Kala Brisella</a></h2>
            <a href="/event/details/4711">Tickets</a>
          </div>
        </li>
        <li>
          <div class="meta"><span>So</span><span>23.11.2025</span><span>11:00 Uhr</span></div>
          <div class="body"><span>Lesung</span><h2><a href="/event/details/4712">Sonntagslesung</a></h2></div>
        </li>
        <li>
          <div class="meta"><span>Fr</span><span>28.11.2025</span><span>20:00 Uhr</span></div>
          <div class="body"><span>Konzert</span><span>Entfällt</span><h2><a href="/event/details/4713">Abgesagte Band</a></h2></div>
        </li>
        <li>
          <div class="meta"><span>Sa</span><span>06.12.2025</span><span>23:00 Uhr</span></div>
          <div class="body"><span>Party</span><h2><a href="https://pavillon-hannover.de/event/details/4714">Nachtschicht</a></h2></div>
        </li>
      </ul>
    </body></html>
    "#;

    fn scraper() -> Pavillon {
        Pavillon::from_settings("pavillon", &SourceSettings::default()).expect("construct")
    }

    #[test]
    fn keeps_music_events_only() {
        let events = scraper().parse_document(SAMPLE_HTML).expect("parse");
        let titles: Vec<_> = events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Kala Brisella", "Nachtschicht"]);
    }

    #[test]
    fn reads_date_time_and_genre_from_listing_text() {
        let events = scraper().parse_document(SAMPLE_HTML).expect("parse");
        let kala = &events[0];
        assert_eq!(kala.date.to_rfc3339(), "2025-11-22T18:30:00+01:00");
        assert_eq!(
            kala.url.as_deref(),
            Some("https://pavillon-hannover.de/event/details/4711")
        );
        assert_eq!(kala.meta_text("genre"), Some("Konzert"));
        assert_eq!(kala.meta_text("address"), Some(ADDRESS));
        assert_eq!(events[1].meta_text("genre"), Some("Party"));
    }

    #[test]
    fn title_skips_labels_and_dates() {
        assert_eq!(
            extract_title("Sa | 22.11.2025 | 18:30 Uhr | Konzert | 23.11.2025 | Kala Brisella | Tickets"),
            Some("Kala Brisella".to_string())
        );
        assert_eq!(extract_title("Sa | 22.11.2025 | Konzert"), None);
    }

    #[test]
    fn page_without_detail_links_is_a_parse_error() {
        assert!(scraper().parse_document("<a href=\"/kontakt\">Kontakt</a>").is_err());
    }
}
