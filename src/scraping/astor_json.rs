use std::collections::HashMap;

use serde::Deserialize;
use tracing::{debug, info};

use super::base;
use super::{RegisteredScraper, SourceIdentity, SourceKind, VenueScraper};
use crate::config::SourceSettings;
use crate::error::{ConfigError, SourceError};
use crate::models::{Event, EventCategory};

const API_URL: &str = "https://backend.premiumkino.de/v1/de/hannover/program";
const VENUE_NAME: &str = "Astor Grand Cinema";
const TICKET_BASE: &str = "https://hannover.premiumkino.de/film/";
const SITE_URL: &str = "https://hannover.premiumkino.de/";

#[derive(Debug, Deserialize)]
struct ProgramResponse {
    #[serde(default)]
    genres: Vec<ApiGenre>,
    #[serde(default)]
    movies: Vec<ApiMovie>,
    performances: Vec<ApiPerformance>,
}

/// The backend is not consistent about numeric vs string ids and counts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(untagged)]
enum ApiId {
    Int(i64),
    Text(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn as_int(&self) -> Option<i64> {
        match self {
            Scalar::Int(value) => Some(*value),
            Scalar::Float(value) => Some(value.round() as i64),
            Scalar::Text(value) => value.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiGenre {
    id: ApiId,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiMovie {
    id: ApiId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    slug: String,
    minutes: Option<Scalar>,
    rating: Option<Scalar>,
    year: Option<Scalar>,
    country: Option<String>,
    #[serde(default)]
    genre_ids: Vec<ApiId>,
    poster: Option<serde_json::Value>,
    #[serde(default)]
    translations: Vec<ApiTranslation>,
    #[serde(default)]
    trailers: Vec<ApiTrailer>,
    #[serde(default)]
    casts: Vec<ApiCast>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTranslation {
    language: Option<String>,
    desc_short: Option<String>,
    desc_long: Option<String>,
}

impl ApiTranslation {
    fn description(&self) -> Option<&str> {
        [self.desc_short.as_deref(), self.desc_long.as_deref()]
            .into_iter()
            .flatten()
            .find(|text| !text.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ApiTrailer {
    url720: Option<String>,
    url1080: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiCast {
    function: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPerformance {
    movie_id: Option<ApiId>,
    language: Option<String>,
    begin: Option<String>,
}

pub struct AstorHannover {
    identity: SourceIdentity,
}

impl VenueScraper for AstorHannover {
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
        SourceKind::Cinema
    }

    fn fetch(&self) -> Result<Vec<Event>, SourceError> {
        let body = base::fetch_text(
            &self.identity.url,
            &[
                ("Accept", "application/json, text/plain, */*"),
                ("Referer", SITE_URL),
            ],
        )?;
        let events = self.parse_program(&body)?;
        info!(source = %self.identity.name, count = events.len(), "found OV showtimes");
        Ok(events)
    }
}

impl RegisteredScraper for AstorHannover {
    const KIND: SourceKind = SourceKind::Cinema;

    fn from_settings(name: &str, settings: &SourceSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            identity: SourceIdentity::new(name, settings, VENUE_NAME, API_URL),
        })
    }
}

impl AstorHannover {
    pub(crate) fn parse_program(&self, body: &str) -> Result<Vec<Event>, SourceError> {
        let program: ProgramResponse = serde_json::from_str(body)
            .map_err(|err| SourceError::parse(&self.identity.name, err.to_string()))?;

        let genres: HashMap<&ApiId, &str> = program
            .genres
            .iter()
            .map(|genre| (&genre.id, genre.name.as_str()))
            .collect();
        let movies: HashMap<&ApiId, &ApiMovie> =
            program.movies.iter().map(|movie| (&movie.id, movie)).collect();

        let mut events = Vec::new();
        for performance in &program.performances {
            let Some(movie) = performance.movie_id.as_ref().and_then(|id| movies.get(id)) else {
                continue;
            };
            let language = performance.language.as_deref().unwrap_or_default();
            if !base::is_original_version(language) {
                debug!(title = %movie.name, language, "skipping dubbed showing");
                continue;
            }
            let Some(start) = performance.begin.as_deref().and_then(base::parse_iso_datetime)
            else {
                continue;
            };
            let Some(event) =
                Event::new(&movie.name, start, &self.identity.display_name, EventCategory::Movie)
            else {
                continue;
            };
            events.push(self.enrich(event, movie, performance, &genres));
        }

        Ok(events)
    }

    fn enrich(
        &self,
        event: Event,
        movie: &ApiMovie,
        performance: &ApiPerformance,
        genres: &HashMap<&ApiId, &str>,
    ) -> Event {
        let url = if movie.slug.trim().is_empty() {
            SITE_URL.to_string()
        } else {
            format!("{TICKET_BASE}{}", movie.slug.trim())
        };

        let genre_names: Vec<String> = movie
            .genre_ids
            .iter()
            .filter_map(|id| genres.get(id))
            .filter(|name| !name.is_empty())
            .map(|name| name.to_string())
            .collect();

        let poster_url = movie
            .poster
            .as_ref()
            .and_then(|poster| poster.get("src"))
            .and_then(|src| src.as_str())
            .unwrap_or_default();

        let cast: Vec<String> = movie
            .casts
            .iter()
            .filter_map(|person| {
                let name = person.name.as_deref()?.trim();
                if name.is_empty() {
                    return None;
                }
                Some(match person.function.as_deref().map(str::trim) {
                    Some(role) if !role.is_empty() => format!("{role}: {name}"),
                    _ => name.to_string(),
                })
            })
            .collect();

        let time = event.time_label();
        let mut event = event
            .with_url(Some(url))
            .with_meta("time", time)
            .with_meta("language", performance.language.clone().unwrap_or_default())
            .with_meta("country", movie.country.clone().unwrap_or_default())
            .with_meta("genres", genre_names)
            .with_meta("poster_url", poster_url)
            .with_meta("synopsis", synopsis(&movie.translations))
            .with_meta("trailer_url", trailer_url(&movie.trailers))
            .with_meta("cast", cast);

        for (key, value) in [
            ("duration", &movie.minutes),
            ("rating", &movie.rating),
            ("year", &movie.year),
        ] {
            if let Some(number) = value.as_ref().and_then(Scalar::as_int) {
                if key == "rating" || number > 0 {
                    event = event.with_meta(key, number);
                }
            }
        }

        match &movie.id {
            ApiId::Int(id) => event.with_meta("movie_id", *id),
            ApiId::Text(id) => event.with_meta("movie_id", id.as_str()),
        }
    }
}

/// German description when present, otherwise the first translation.
fn synopsis(translations: &[ApiTranslation]) -> String {
    translations
        .iter()
        .find(|t| t.language.as_deref() == Some("de"))
        .or_else(|| translations.first())
        .and_then(ApiTranslation::description)
        .map(base::strip_markup)
        .unwrap_or_default()
}

fn trailer_url(trailers: &[ApiTrailer]) -> String {
    trailers
        .iter()
        .find_map(|trailer| {
            trailer
                .url720
                .as_deref()
                .filter(|url| !url.is_empty())
                .or_else(|| trailer.url1080.as_deref().filter(|url| !url.is_empty()))
        })
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MetaValue;
    use pretty_assertions::assert_eq;

    const SAMPLE_JSON: &str = r#"{
        "genres": [{"id": 1, "name": "Musical"}, {"id": 2, "name": "Fantasy"}, {"id": 3, "name": ""}],
        "movies": [
            {
                "id": 101,
                "name": "Wicked: For Good",
                "slug": "wicked-for-good",
                "minutes": 137,
                "rating": 6,
                "year": 2025,
                "country": "USA",
                "genreIds": [1, 2, 3],
                "poster": {"src": "https://cdn.example/wicked.jpg"},
                "translations": [
                    {"language": "en", "descShort": "The story continues."},
                    {"language": "de", "descShort": "", "descLong": "<p>Die Geschichte geht weiter &amp; endet.</p>"}
                ],
                "trailers": [{"url1080": "https://cdn.example/t1080.mp4"}, {"url720": "https://cdn.example/t720.mp4"}],
                "casts": [{"function": "Regie", "name": "Jon M. Chu"}, {"function": "", "name": "Cynthia Erivo"}]
            },
            {
                "id": "102",
                "name": "Der Hausmeister",
                "slug": "",
                "poster": []
            }
        ],
        "performances": [
            {"movieId": 101, "language": "Sprache: Englisch", "begin": "2025-11-22T19:30:00"},
            {"movieId": 101, "language": "Sprache: Deutsch", "begin": "2025-11-22T17:00:00"},
            {"movieId": "102", "language": "Sprache: Deutsch, Untertitel: Englisch", "begin": "2025-11-23T20:15:00+01:00"},
            {"movieId": 999, "language": "Sprache: Englisch", "begin": "2025-11-23T20:15:00"},
            {"movieId": 101, "language": "", "begin": "2025-11-24T20:15:00"},
            {"movieId": 101, "language": "Sprache: Englisch"}
        ]
    }"#;

    fn scraper() -> AstorHannover {
        AstorHannover::from_settings("astor_hannover", &SourceSettings::default())
            .expect("construct")
    }

    #[test]
    fn keeps_only_original_versions() {
        let events = scraper().parse_program(SAMPLE_JSON).expect("parse");
        let titles: Vec<_> = events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Wicked: For Good", "Der Hausmeister"]);
        assert!(events.iter().all(|e| e.category == EventCategory::Movie));
        assert!(events.iter().all(|e| e.venue == VENUE_NAME));
    }

    #[test]
    fn extracts_movie_metadata() {
        let events = scraper().parse_program(SAMPLE_JSON).expect("parse");
        let wicked = &events[0];
        assert_eq!(wicked.date.to_rfc3339(), "2025-11-22T19:30:00+01:00");
        assert_eq!(
            wicked.url.as_deref(),
            Some("https://hannover.premiumkino.de/film/wicked-for-good")
        );
        assert_eq!(wicked.meta_int("duration"), Some(137));
        assert_eq!(wicked.meta_int("rating"), Some(6));
        assert_eq!(wicked.meta_int("year"), Some(2025));
        assert_eq!(wicked.meta_text("time"), Some("19:30"));
        assert_eq!(
            wicked.meta("genres"),
            Some(&MetaValue::List(vec!["Musical".into(), "Fantasy".into()]))
        );
        assert_eq!(
            wicked.meta_text("synopsis"),
            Some("Die Geschichte geht weiter & endet.")
        );
        assert_eq!(wicked.meta_text("trailer_url"), Some("https://cdn.example/t1080.mp4"));
        assert_eq!(
            wicked.meta("cast"),
            Some(&MetaValue::List(vec![
                "Regie: Jon M. Chu".into(),
                "Cynthia Erivo".into()
            ]))
        );
        assert_eq!(wicked.meta_int("movie_id"), Some(101));
    }

    #[test]
    fn sparse_movies_leave_metadata_unknown() {
        let events = scraper().parse_program(SAMPLE_JSON).expect("parse");
        let sparse = &events[1];
        assert_eq!(sparse.url.as_deref(), Some(SITE_URL));
        assert!(sparse.meta("duration").is_none());
        assert!(sparse.meta("poster_url").is_none());
        assert!(sparse.meta("genres").is_none());
        assert_eq!(sparse.meta_text("movie_id"), Some("102"));
    }

    #[test]
    fn missing_performances_is_a_parse_error() {
        let err = scraper()
            .parse_program(r#"{"movies": [], "genres": []}"#)
            .expect_err("must fail");
        assert_eq!(err.kind(), "parse");
        assert!(scraper().parse_program("<html>maintenance</html>").is_err());
    }

    #[test]
    fn empty_program_is_valid() {
        let events = scraper()
            .parse_program(r#"{"performances": []}"#)
            .expect("parse");
        assert!(events.is_empty());
    }
}
