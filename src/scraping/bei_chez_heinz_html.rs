use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::info;

use super::base;
use super::{RegisteredScraper, SourceIdentity, SourceKind, VenueScraper};
use crate::config::SourceSettings;
use crate::error::{ConfigError, SourceError};
use crate::models::Event;

const URL: &str = "https://www.beichezheinz.de/programm";
const VENUE_NAME: &str = "Béi Chéz Heinz";
const ADDRESS: &str = "Liepmannstraße 7b, 30453 Hannover";
const CONCERT_LABEL: &str = "Konzert";

static PANE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.pane").expect("bch pane selector"));
static HEADING_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h3").expect("bch title"));
static HEADING_LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h3 a").expect("bch title link"));
static CATEGORY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h4").expect("bch category"));
static INFO_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.bch-event-info").expect("bch info"));

static URL_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(\d{4})-(\d{2})-(\d{2})").expect("bch url date regex"));
static BEGINN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Beginn[:\s]*(\d{1,2})[.:](\d{2})").expect("bch beginn regex"));
static EINLASS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Einlass[:\s]*(\d{1,2})[.:](\d{2})").expect("bch einlass regex"));
static PRICE_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)Abendkasse[:\s]*([^|]+)",
        r"(\d+[,.]?\d*\s*€)",
        r"(?i)(Eintritt frei)",
        r"(?i)(Ein Hut geht rum)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("bch price regex"))
    .collect()
});
static GENRE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^)]+)\)").expect("bch genre regex"));

pub struct BeiChezHeinz {
    identity: SourceIdentity,
}

impl VenueScraper for BeiChezHeinz {
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

impl RegisteredScraper for BeiChezHeinz {
    const KIND: SourceKind = SourceKind::Concert;
    const MAX_EVENTS: Option<usize> = Some(20);

    fn from_settings(name: &str, settings: &SourceSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            identity: SourceIdentity::new(name, settings, VENUE_NAME, URL),
        })
    }
}

impl BeiChezHeinz {
    pub(crate) fn parse_document(&self, html: &str) -> Result<Vec<Event>, SourceError> {
        let document = Html::parse_document(html);
        let panes: Vec<_> = document.select(&PANE_SELECTOR).collect();
        if panes.is_empty() {
            return Err(SourceError::parse(&self.identity.name, "no div.pane blocks on page"));
        }

        Ok(panes
            .iter()
            .filter(|pane| {
                base::first_text(pane, &CATEGORY_SELECTOR)
                    .map_or(false, |label| label.contains(CONCERT_LABEL))
            })
            .filter_map(|pane| self.parse_pane(pane))
            .collect())
    }

    fn parse_pane(&self, pane: &ElementRef<'_>) -> Option<Event> {
        let link = pane.select(&HEADING_LINK_SELECTOR).next();
        let title = match link {
            Some(link) => base::inner_text(link),
            None => base::first_text(pane, &HEADING_SELECTOR)?,
        };
        let href = link
            .and_then(|link| link.value().attr("href"))
            .unwrap_or_default();
        let info = pane
            .select(&INFO_SELECTOR)
            .next()
            .map(|el| base::joined_text(el, " | "))
            .unwrap_or_default();

        let start = date_from_url(href)
            .map(|date| date.and_time(base::DEFAULT_START))
            .or_else(|| base::parse_venue_date(&info))
            .map(|start| with_start_time(start, &info))
            .and_then(base::localize)?;

        let url = if href.is_empty() {
            Some(self.identity.url.clone())
        } else {
            base::absolute_url(&self.identity.url, Some(href.to_string()))
        };

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
                .with_meta("price", price(&info))
                .with_meta("genre", genre(&title))
                .with_meta("event_type", "concert")
                .with_meta("address", ADDRESS),
        )
    }
}

/// Detail links look like `programm/2025-11-22/1234`.
fn date_from_url(href: &str) -> Option<NaiveDate> {
    let caps = URL_DATE_RE.captures(href)?;
    NaiveDate::from_ymd_opt(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    )
}

/// `Beginn` wins; with only `Einlass` the show starts an hour after doors.
fn with_start_time(start: NaiveDateTime, info: &str) -> NaiveDateTime {
    let clock = |re: &Regex| -> Option<NaiveTime> {
        let caps = re.captures(info)?;
        NaiveTime::from_hms_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, 0)
    };
    if let Some(begin) = clock(&BEGINN_RE) {
        return start.date().and_time(begin);
    }
    match clock(&EINLASS_RE) {
        Some(doors) => start.date().and_time(doors) + Duration::hours(1),
        None => start,
    }
}

fn price(info: &str) -> String {
    PRICE_RES
        .iter()
        .find_map(|re| re.captures(info))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// `FREUDE (Alternative / Österreich)` → `Alternative`.
fn genre(title: &str) -> String {
    GENRE_RE
        .captures(title)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().split(['/', ',']).next())
        .map(|genre| genre.trim().to_string())
        .unwrap_or_default()
}
