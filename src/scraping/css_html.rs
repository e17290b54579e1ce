//! Generic listing adapter driven entirely by configured CSS selectors.

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use super::base;
use super::{RegisteredScraper, SourceIdentity, SourceKind, VenueScraper};
use crate::config::{SelectorConfig, SourceSettings};
use crate::error::{ConfigError, SourceError};
use crate::models::{Event, EventCategory};

const DEFAULT_DATE_ATTR: &str = "datetime";

struct CompiledSelectors {
    container_css: String,
    container: Selector,
    title: Selector,
    date: Selector,
    date_attr: String,
    venue: Option<Selector>,
    link: Option<Selector>,
}

impl CompiledSelectors {
    fn compile(source_name: &str, config: &SelectorConfig) -> Result<Self, ConfigError> {
        let optional = |css: &Option<String>| {
            css.as_deref()
                .map(|css| base::compile_selector(source_name, css))
                .transpose()
        };
        Ok(Self {
            container_css: config.container.clone(),
            container: base::compile_selector(source_name, &config.container)?,
            title: base::compile_selector(source_name, &config.title)?,
            date: base::compile_selector(source_name, &config.date)?,
            date_attr: config
                .date_attr
                .clone()
                .unwrap_or_else(|| DEFAULT_DATE_ATTR.to_string()),
            venue: optional(&config.venue)?,
            link: optional(&config.link)?,
        })
    }
}

/// Built-in values a wrapping adapter supplies; config fields win.
pub(crate) struct CssDefaults<'a> {
    pub display_name: &'a str,
    pub url: &'a str,
    pub selectors: Option<SelectorConfig>,
    pub ignore_keywords: &'a [&'a str],
}

pub struct CssSelectorScraper {
    identity: SourceIdentity,
    kind: SourceKind,
    category: EventCategory,
    selectors: CompiledSelectors,
    ignore_keywords: Vec<String>,
}

impl VenueScraper for CssSelectorScraper {
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
        self.kind
    }

    fn fetch(&self) -> Result<Vec<Event>, SourceError> {
        let html = base::fetch_html(&self.identity.url)?;
        let events = self.parse_document(&html)?;
        info!(source = %self.identity.name, count = events.len(), "parsed events");
        Ok(events)
    }
}

impl RegisteredScraper for CssSelectorScraper {
    const KIND: SourceKind = SourceKind::Culture;

    fn from_settings(name: &str, settings: &SourceSettings) -> Result<Self, ConfigError> {
        let url = settings
            .url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingUrl(name.to_string()))?;
        Self::with_defaults(
            name,
            settings,
            CssDefaults {
                display_name: name,
                url,
                selectors: None,
                ignore_keywords: &[],
            },
        )
    }
}

impl CssSelectorScraper {
    pub(crate) fn with_defaults(
        name: &str,
        settings: &SourceSettings,
        defaults: CssDefaults<'_>,
    ) -> Result<Self, ConfigError> {
        let selector_config = settings
            .selectors
            .clone()
            .or(defaults.selectors)
            .ok_or_else(|| ConfigError::MissingSelectors(name.to_string()))?;
        let kind = settings.kind.unwrap_or(Self::KIND);
        let ignore_keywords = settings.ignore_keywords.clone().unwrap_or_else(|| {
            defaults
                .ignore_keywords
                .iter()
                .map(|keyword| keyword.to_string())
                .collect()
        });

        Ok(Self {
            identity: SourceIdentity::new(name, settings, defaults.display_name, defaults.url),
            kind,
            category: settings.category.unwrap_or_else(|| kind.default_category()),
            selectors: CompiledSelectors::compile(name, &selector_config)?,
            ignore_keywords,
        })
    }

    pub(crate) fn parse_document(&self, html: &str) -> Result<Vec<Event>, SourceError> {
        let document = Html::parse_document(html);
        let items: Vec<_> = document.select(&self.selectors.container).collect();
        if items.is_empty() {
            return Err(SourceError::parse(
                &self.identity.name,
                format!("container selector {:?} matched nothing", self.selectors.container_css),
            ));
        }
        Ok(items
            .iter()
            .filter_map(|item| self.parse_item(item))
            .collect())
    }

    fn parse_item(&self, item: &ElementRef<'_>) -> Option<Event> {
        let title = base::first_text(item, &self.selectors.title)?;
        if base::should_ignore(&title, &self.ignore_keywords) {
            debug!(source = %self.identity.name, title = %title, "ignored by keyword");
            return None;
        }

        let date_el = item.select(&self.selectors.date).next()?;
        let raw_date = date_el
            .value()
            .attr(&self.selectors.date_attr)
            .map(str::to_string)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| base::inner_text(date_el));
        let Some(start) = base::parse_iso_datetime(&raw_date) else {
            debug!(source = %self.identity.name, raw = %raw_date, "unparseable date");
            return None;
        };

        let venue = self
            .selectors
            .venue
            .as_ref()
            .and_then(|selector| base::first_text(item, selector))
            .unwrap_or_else(|| self.identity.display_name.clone());
        let url = self
            .selectors
            .link
            .as_ref()
            .and_then(|selector| base::first_attr(item, selector, "href"))
            .and_then(|href| base::absolute_url(&self.identity.url, Some(href)))
            .or_else(|| Some(self.identity.url.clone()));

        let event = Event::new(&title, start, &venue, self.category)?;
        let time = event.time_label();
        Some(
            event
                .with_url(url)
                .with_meta("time", time)
                .with_meta("event_type", self.kind.as_str()),
        )
    }
}
