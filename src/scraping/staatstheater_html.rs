use super::css_html::{CssDefaults, CssSelectorScraper};
use super::{RegisteredScraper, SourceKind, VenueScraper};
use crate::config::{SelectorConfig, SourceSettings};
use crate::error::{ConfigError, SourceError};
use crate::models::Event;

const URL: &str = "https://www.staatstheater-hannover.de/de_DE/kalender";
const VENUE_NAME: &str = "Staatstheater Hannover";
const IGNORE_KEYWORDS: [&str; 7] = [
    "Führung",
    "Einführung",
    "Kindertheater",
    "Kindertanz",
    "Workshop",
    "Probe",
    "Geschlossene Veranstaltung",
];

fn default_selectors() -> SelectorConfig {
    SelectorConfig {
        container: "article.event, .event-item, article".to_string(),
        title: "h2, h3, h4, .title, .event-title".to_string(),
        date: "time, .date, .event-date, .datetime".to_string(),
        date_attr: None,
        venue: Some(".venue, .location, .event-venue".to_string()),
        link: Some("a".to_string()),
    }
}

/// Opera, ballet and drama from the house calendar.
pub struct Staatstheater(CssSelectorScraper);

impl VenueScraper for Staatstheater {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn display_name(&self) -> &str {
        self.0.display_name()
    }

    fn venue_url(&self) -> &str {
        self.0.venue_url()
    }

    fn category(&self) -> SourceKind {
        self.0.category()
    }

    fn fetch(&self) -> Result<Vec<Event>, SourceError> {
        self.0.fetch()
    }
}

impl RegisteredScraper for Staatstheater {
    const KIND: SourceKind = SourceKind::Culture;

    fn from_settings(name: &str, settings: &SourceSettings) -> Result<Self, ConfigError> {
        CssSelectorScraper::with_defaults(
            name,
            settings,
            CssDefaults {
                display_name: VENUE_NAME,
                url: URL,
                selectors: Some(default_selectors()),
                ignore_keywords: &IGNORE_KEYWORDS,
            },
        )
        .map(Self)
    }
}
