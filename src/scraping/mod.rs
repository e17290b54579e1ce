pub mod astor_json;
pub mod base;
pub mod bei_chez_heinz_html;
pub mod css_html;
pub mod faust_html;
pub mod hc_cards_html;
pub mod musikzentrum_jsonld;
pub mod pavillon_html;
pub mod registry;
pub mod staatstheater_html;
pub mod zag_arena_html;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::SourceSettings;
use crate::error::{ConfigError, SourceError};
use crate::models::{Event, EventCategory};

pub use registry::{ActiveSource, SourceDescriptor, SourceFactory, SourceRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Cinema,
    Concert,
    Culture,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Cinema => "cinema",
            SourceKind::Concert => "concert",
            SourceKind::Culture => "culture",
        }
    }

    pub fn default_category(&self) -> EventCategory {
        match self {
            SourceKind::Cinema => EventCategory::Movie,
            SourceKind::Concert => EventCategory::Radar,
            SourceKind::Culture => EventCategory::Culture,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait VenueScraper: Send + Sync {
    fn name(&self) -> &str;
    fn display_name(&self) -> &str;
    fn venue_url(&self) -> &str;
    fn category(&self) -> SourceKind;
    fn fetch(&self) -> Result<Vec<Event>, SourceError>;
}

/// Static facts the registry needs before an adapter is built.
pub trait RegisteredScraper: VenueScraper + Sized + 'static {
    const KIND: SourceKind;
    const MAX_EVENTS: Option<usize> = None;
    const ENABLED: bool = true;

    fn from_settings(name: &str, settings: &SourceSettings) -> Result<Self, ConfigError>;
}

/// Registry name plus the label and page an adapter reports. Config may
/// override the label and the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceIdentity {
    pub name: String,
    pub display_name: String,
    pub url: String,
}

impl SourceIdentity {
    pub fn new(name: &str, settings: &SourceSettings, display_name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: settings
                .display_name
                .clone()
                .unwrap_or_else(|| display_name.to_string()),
            url: settings.url.clone().unwrap_or_else(|| url.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_display_categories() {
        assert_eq!(SourceKind::Cinema.default_category(), EventCategory::Movie);
        assert_eq!(SourceKind::Concert.default_category(), EventCategory::Radar);
        assert_eq!(SourceKind::Culture.default_category(), EventCategory::Culture);
    }

    #[test]
    fn kind_round_trips_through_serde() {
        let kind: SourceKind = serde_json::from_str("\"concert\"").expect("parse");
        assert_eq!(kind, SourceKind::Concert);
        assert_eq!(kind.to_string(), "concert");
    }

    #[test]
    fn identity_prefers_configured_overrides() {
        let settings = SourceSettings {
            url: Some("https://mirror.example/program".into()),
            ..SourceSettings::default()
        };
        let identity = SourceIdentity::new("astor_hannover", &settings, "Astor", "https://a.de");
        assert_eq!(identity.display_name, "Astor");
        assert_eq!(identity.url, "https://mirror.example/program");
    }
}
