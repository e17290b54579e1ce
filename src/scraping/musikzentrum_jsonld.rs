use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{info, warn};

use super::base;
use super::{RegisteredScraper, SourceIdentity, SourceKind, VenueScraper};
use crate::config::SourceSettings;
use crate::error::{ConfigError, SourceError};
use crate::models::Event;

const URL: &str = "https://musikzentrum-hannover.de/veranstaltungen/";
const VENUE_NAME: &str = "MusikZentrum";
const ADDRESS: &str = "Emil-Meyer-Str. 26, 30165 Hannover";
const DESCRIPTION_CHARS: usize = 200;

static JSON_LD_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("json-ld selector")
});

pub struct MusikZentrum {
    identity: SourceIdentity,
}

impl VenueScraper for MusikZentrum {
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

impl RegisteredScraper for MusikZentrum {
    const KIND: SourceKind = SourceKind::Concert;
    const MAX_EVENTS: Option<usize> = Some(20);

    fn from_settings(name: &str, settings: &SourceSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            identity: SourceIdentity::new(name, settings, VENUE_NAME, URL),
        })
    }
}

impl MusikZentrum {
    pub(crate) fn parse_document(&self, html: &str) -> Result<Vec<Event>, SourceError> {
        let document = Html::parse_document(html);
        let scripts: Vec<String> = document
            .select(&JSON_LD_SELECTOR)
            .map(|script| script.text().collect::<String>())
            .collect();
        if scripts.is_empty() {
            return Err(SourceError::parse(
                &self.identity.name,
                "no application/ld+json block on page",
            ));
        }

        let mut items = Vec::new();
        let mut decoded_any = false;
        for script in &scripts {
            match serde_json::from_str::<Value>(script) {
                Ok(Value::Array(values)) => {
                    decoded_any = true;
                    items.extend(values);
                }
                Ok(value) => {
                    decoded_any = true;
                    items.push(value);
                }
                Err(err) => {
                    warn!(source = %self.identity.name, error = %err, "skipping malformed JSON-LD block");
                }
            }
        }
        if !decoded_any {
            return Err(SourceError::parse(
                &self.identity.name,
                "every JSON-LD block was malformed",
            ));
        }

        Ok(items
            .iter()
            .filter(|item| item.get("@type").and_then(Value::as_str) == Some("Event"))
            .filter_map(|item| self.parse_item(item))
            .collect())
    }

    fn parse_item(&self, item: &Value) -> Option<Event> {
        let title = base::strip_markup(item.get("name")?.as_str()?);
        let start = base::parse_iso_datetime(item.get("startDate")?.as_str()?)?;

        let url = item
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(self.identity.url.clone()));
        let location = item.get("location");
        let address = location
            .and_then(|location| location.get("address"))
            .map(format_address)
            .filter(|address| !address.is_empty())
            .unwrap_or_else(|| ADDRESS.to_string());
        let description = item
            .get("description")
            .and_then(Value::as_str)
            .map(clean_description)
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
                .with_meta("image_url", image_url(item.get("image")))
                .with_meta("description", description)
                .with_meta("event_type", "concert")
                .with_meta("address", address),
        )
    }
}

/// `image` is a URL, a list of URLs or an ImageObject.
fn image_url(image: Option<&Value>) -> String {
    match image {
        Some(Value::String(url)) => url.clone(),
        Some(Value::Array(values)) => image_url(values.first()),
        Some(Value::Object(object)) => object
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

fn format_address(address: &Value) -> String {
    match address {
        Value::String(text) => base::clean_text(text),
        Value::Object(object) => ["streetAddress", "postalCode", "addressLocality"]
            .iter()
            .filter_map(|key| object.get(*key).and_then(Value::as_str))
            .map(base::clean_text)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

/// Descriptions arrive entity-escaped HTML; decode, then drop the tags.
fn clean_description(raw: &str) -> String {
    let text = base::strip_markup(&base::strip_markup(raw));
    if text.chars().count() > DESCRIPTION_CHARS {
        text.chars().take(DESCRIPTION_CHARS).collect()
    } else {
        text
    }
}
