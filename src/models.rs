use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::scraping::base::clean_text;

/// Every event date in a run lives in this zone.
pub const TIMEZONE: Tz = chrono_tz::Europe::Berlin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Movie,
    Culture,
    Radar,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Movie => "movie",
            EventCategory::Culture => "culture",
            EventCategory::Radar => "radar",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single metadata value. Sources attach whatever they know; readers
/// treat a missing key as "unknown".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Int(i64),
    Text(String),
    List(Vec<String>),
}

impl MetaValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetaValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            MetaValue::Int(value) => Some(*value),
            MetaValue::Text(value) => value.trim().parse().ok(),
            MetaValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            MetaValue::List(values) => Some(values),
            _ => None,
        }
    }

    /// Flat string form used by the CSV columns.
    pub fn to_display(&self) -> String {
        match self {
            MetaValue::Int(value) => value.to_string(),
            MetaValue::Text(value) => value.clone(),
            MetaValue::List(values) => values.join("; "),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        MetaValue::Text(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        MetaValue::Text(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        MetaValue::Int(value)
    }
}

impl From<Vec<String>> for MetaValue {
    fn from(values: Vec<String>) -> Self {
        MetaValue::List(values)
    }
}

pub type Metadata = BTreeMap<String, MetaValue>;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Event {
    pub title: String,
    #[serde(with = "iso_date")]
    pub date: DateTime<Tz>,
    pub venue: String,
    pub url: Option<String>,
    pub category: EventCategory,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Event {
    /// Returns `None` when the title or venue is blank, so adapters can skip
    /// the item instead of emitting a half-built record.
    pub fn new<T: TimeZone>(
        title: &str,
        date: DateTime<T>,
        venue: &str,
        category: EventCategory,
    ) -> Option<Self> {
        let title = clean_text(title);
        let venue = clean_text(venue);
        if title.is_empty() || venue.is_empty() {
            return None;
        }
        Some(Self {
            title,
            date: date.with_timezone(&TIMEZONE),
            venue,
            url: None,
            category,
            metadata: Metadata::new(),
        })
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url.filter(|value| !value.trim().is_empty());
        self
    }

    /// Empty strings and empty lists are dropped; they carry no information.
    pub fn with_meta(mut self, key: &str, value: impl Into<MetaValue>) -> Self {
        let value = value.into();
        let empty = match &value {
            MetaValue::Text(text) => text.trim().is_empty(),
            MetaValue::List(values) => values.is_empty(),
            MetaValue::Int(_) => false,
        };
        if !empty {
            self.metadata.insert(key.to_string(), value);
        }
        self
    }

    pub fn meta(&self, key: &str) -> Option<&MetaValue> {
        self.metadata.get(key)
    }

    pub fn meta_text(&self, key: &str) -> Option<&str> {
        self.meta(key).and_then(MetaValue::as_text)
    }

    pub fn meta_int(&self, key: &str) -> Option<i64> {
        self.meta(key).and_then(MetaValue::as_int)
    }

    /// Stable hash: venue|date|title.
    pub fn id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.venue.as_bytes());
        hasher.update(b"|");
        hasher.update(self.date.to_rfc3339().as_bytes());
        hasher.update(b"|");
        hasher.update(self.title.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn time_label(&self) -> String {
        self.date.format("%H:%M").to_string()
    }
}

mod iso_date {
    use chrono::DateTime;
    use chrono_tz::Tz;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIMEZONE;

    pub fn serialize<S: Serializer>(date: &DateTime<Tz>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&date.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Tz>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&TIMEZONE))
            .map_err(serde::de::Error::custom)
    }
}
