//! Venues whose listings are rendered by the HC-Kartenleger card system.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::info;

use super::base;
use super::{RegisteredScraper, SourceIdentity, SourceKind, VenueScraper};
use crate::config::SourceSettings;
use crate::error::{ConfigError, SourceError};
use crate::models::Event;

const CAPITOL_URL: &str = "https://www.capitol-hannover.de/events/";
const CAPITOL_NAME: &str = "Capitol Hannover";
const CAPITOL_ADDRESS: &str = "Schwarzer Bär 2, 30449 Hannover";

const SWISS_LIFE_URL: &str = "https://www.swisslife-hall.de/events/";
const SWISS_LIFE_NAME: &str = "Swiss Life Hall";
const SWISS_LIFE_ADDRESS: &str = "Ferdinand-Wilhelm-Fricke-Weg 8, 30169 Hannover";

static CARD_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.hc-card-link-wrapper").expect("hc card selector"));
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h4, h3").expect("hc title"));
static DATE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("time").expect("hc date"));
static SUBTITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".hc-card-subtitle, .subtitle, p").expect("hc subtitle"));
static SOLD_OUT_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".sold-out, .ausverkauft, [class*='sold']").expect("hc sold out")
});
static IMAGE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("hc image"));

struct HcCardPage {
    identity: SourceIdentity,
    address: &'static str,
}

impl HcCardPage {
    fn fetch(&self) -> Result<Vec<Event>, SourceError> {
        let html = base::fetch_html(&self.identity.url)?;
        let events = self.parse_document(&html)?;
        info!(source = %self.identity.name, count = events.len(), "parsed events");
        Ok(events)
    }

    fn parse_document(&self, html: &str) -> Result<Vec<Event>, SourceError> {
        let document = Html::parse_document(html);
        let cards: Vec<_> = document.select(&CARD_SELECTOR).collect();
        if cards.is_empty() {
            return Err(SourceError::parse(
                &self.identity.name,
                "no a.hc-card-link-wrapper cards on page",
            ));
        }
        Ok(cards
            .iter()
            .filter_map(|card| self.parse_card(card))
            .collect())
    }

    fn parse_card(&self, card: &ElementRef<'_>) -> Option<Event> {
        let title = card
            .value()
            .attr("title")
            .map(base::clean_text)
            .filter(|title| !title.is_empty())
            .or_else(|| base::first_text(card, &TITLE_SELECTOR))?;

        let time_el = card.select(&DATE_SELECTOR).next()?;
        let start = time_el
            .value()
            .attr("datetime")
            .and_then(base::parse_iso_datetime)
            .or_else(|| {
                base::parse_venue_date(&base::inner_text(time_el)).and_then(base::localize)
            })?;

        let url = base::absolute_url(
            &self.identity.url,
            card.value().attr("href").map(str::to_string),
        );
        let subtitle = base::first_text(card, &SUBTITLE_SELECTOR)
            .filter(|subtitle| *subtitle != title)
            .unwrap_or_default();
        let image_url = card
            .select(&IMAGE_SELECTOR)
            .next()
            .and_then(|img| img.value().attr("src").or_else(|| img.value().attr("data-src")))
            .and_then(|src| base::absolute_url(&self.identity.url, Some(src.to_string())))
            .unwrap_or_default();

        let event = Event::new(
            &title,
            start,
            &self.identity.display_name,
            SourceKind::Concert.default_category(),
        )?;
        let time = event.time_label();
        Some(
            event
                .with_url(url)
                .with_meta("time", time)
                .with_meta("subtitle", subtitle)
                .with_meta("image_url", image_url)
                .with_meta("status", sold_out_status(card))
                .with_meta("event_type", "concert")
                .with_meta("address", self.address),
        )
    }
}

fn sold_out_status(card: &ElementRef<'_>) -> &'static str {
    if card.select(&SOLD_OUT_SELECTOR).next().is_some() {
        return "sold_out";
    }
    let text = base::inner_text(*card).to_lowercase();
    if text.contains("ausverkauft") || text.contains("sold out") {
        "sold_out"
    } else {
        "available"
    }
}

pub struct Capitol(HcCardPage);

impl VenueScraper for Capitol {
    fn name(&self) -> &str {
        &self.0.identity.name
    }

    fn display_name(&self) -> &str {
        &self.0.identity.display_name
    }

    fn venue_url(&self) -> &str {
        &self.0.identity.url
    }

    fn category(&self) -> SourceKind {
        SourceKind::Concert
    }

    fn fetch(&self) -> Result<Vec<Event>, SourceError> {
        self.0.fetch()
    }
}

impl RegisteredScraper for Capitol {
    const KIND: SourceKind = SourceKind::Concert;
    const MAX_EVENTS: Option<usize> = Some(15);

    fn from_settings(name: &str, settings: &SourceSettings) -> Result<Self, ConfigError> {
        Ok(Self(HcCardPage {
            identity: SourceIdentity::new(name, settings, CAPITOL_NAME, CAPITOL_URL),
            address: CAPITOL_ADDRESS,
        }))
    }
}

pub struct SwissLifeHall(HcCardPage);

impl VenueScraper for SwissLifeHall {
    fn name(&self) -> &str {
        &self.0.identity.name
    }

    fn display_name(&self) -> &str {
        &self.0.identity.display_name
    }

    fn venue_url(&self) -> &str {
        &self.0.identity.url
    }

    fn category(&self) -> SourceKind {
        SourceKind::Concert
    }

    fn fetch(&self) -> Result<Vec<Event>, SourceError> {
        self.0.fetch()
    }
}

impl RegisteredScraper for SwissLifeHall {
    const KIND: SourceKind = SourceKind::Concert;
    const MAX_EVENTS: Option<usize> = Some(15);

    fn from_settings(name: &str, settings: &SourceSettings) -> Result<Self, ConfigError> {
        Ok(Self(HcCardPage {
            identity: SourceIdentity::new(name, settings, SWISS_LIFE_NAME, SWISS_LIFE_URL),
            address: SWISS_LIFE_ADDRESS,
        }))
    }
}
