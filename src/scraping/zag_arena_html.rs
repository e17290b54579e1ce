use chrono::NaiveDate;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::info;

use super::base;
use super::{RegisteredScraper, SourceIdentity, SourceKind, VenueScraper};
use crate::config::SourceSettings;
use crate::error::{ConfigError, SourceError};
use crate::models::Event;

const URL: &str = "https://www.zag-arena-hannover.de/veranstaltungen/";
const VENUE_NAME: &str = "ZAG Arena";
const ADDRESS: &str = "Expo Plaza 7, 30539 Hannover";

static CARD_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".wpem-event-layout-wrapper").expect("zag card selector"));
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".wpem-heading-text").expect("zag title"));
static DATE_TIME_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".wpem-event-date-time-text").expect("zag date time"));
static DAY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".wpem-date").expect("zag day"));
static MONTH_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".wpem-month").expect("zag month"));
static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.wpem-event-action-url").expect("zag link"));
static IMAGE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("zag image"));

pub struct ZagArena {
    identity: SourceIdentity,
}

impl VenueScraper for ZagArena {
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
        let events = self.parse_document(&html, base::today())?;
        info!(source = %self.identity.name, count = events.len(), "parsed events");
        Ok(events)
    }
}

impl RegisteredScraper for ZagArena {
    const KIND: SourceKind = SourceKind::Concert;
    const MAX_EVENTS: Option<usize> = Some(15);

    fn from_settings(name: &str, settings: &SourceSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            identity: SourceIdentity::new(name, settings, VENUE_NAME, URL),
        })
    }
}

impl ZagArena {
    pub(crate) fn parse_document(
        &self,
        html: &str,
        today: NaiveDate,
    ) -> Result<Vec<Event>, SourceError> {
        let document = Html::parse_document(html);
        let cards: Vec<_> = document.select(&CARD_SELECTOR).collect();
        if cards.is_empty() {
            return Err(SourceError::parse(
                &self.identity.name,
                "no .wpem-event-layout-wrapper cards on page",
            ));
        }

        let mut events = Vec::new();
        for card in cards {
            if let Some(event) = self.parse_card(&card, today) {
                events.push(event);
            }
        }
        Ok(events)
    }

    fn parse_card(&self, card: &ElementRef<'_>, today: NaiveDate) -> Option<Event> {
        let title = base::first_text(card, &TITLE_SELECTOR)?;
        let start = base::first_text(card, &DATE_TIME_SELECTOR)
            .and_then(|text| base::parse_german_date(&text))
            .or_else(|| {
                let day = base::first_text(card, &DAY_SELECTOR)?.parse().ok()?;
                let month = base::german_month(&base::first_text(card, &MONTH_SELECTOR)?)?;
                Some(base::infer_year(month, day, today)?.and_time(base::DEFAULT_START))
            })
            .and_then(base::localize)?;

        let url = base::absolute_url(&self.identity.url, base::first_attr(card, &LINK_SELECTOR, "href"));
        let image_url = card
            .select(&IMAGE_SELECTOR)
            .next()
            .and_then(|img| img.value().attr("src").or_else(|| img.value().attr("data-src")))
            .and_then(|src| base::absolute_url(&self.identity.url, Some(src.to_string())))
            .unwrap_or_default();
        let event_type = event_type(url.as_deref().unwrap_or_default());

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
                .with_meta("event_type", event_type)
                .with_meta("image_url", image_url)
                .with_meta("address", ADDRESS),
        )
    }
}

fn event_type(url: &str) -> &'static str {
    let lowered = url.to_lowercase();
    if lowered.contains("sport") {
        "sport"
    } else if lowered.contains("show") || lowered.contains("comedy") {
        "show"
    } else {
        "concert"
    }
}
