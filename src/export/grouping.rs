use std::collections::HashMap;
use std::hash::Hash;

use crate::models::{Event, EventCategory};

/// Several showtimes of the same thing, borrowed from the bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedEvent<'a> {
    pub showtimes: Vec<&'a Event>,
}

impl<'a> GroupedEvent<'a> {
    /// Groups are never empty.
    pub fn first(&self) -> &'a Event {
        self.showtimes[0]
    }

    pub fn title(&self) -> &'a str {
        &self.first().title
    }

    pub fn venue(&self) -> &'a str {
        &self.first().venue
    }

    pub fn url(&self) -> Option<&'a str> {
        self.first().url.as_deref()
    }

    pub fn len(&self) -> usize {
        self.showtimes.len()
    }
}

fn group_by<'a, K, F>(events: impl Iterator<Item = &'a Event>, key: F) -> Vec<GroupedEvent<'a>>
where
    K: Eq + Hash,
    F: Fn(&Event) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<GroupedEvent<'a>> = Vec::new();
    for event in events {
        let slot = *index.entry(key(event)).or_insert_with(|| {
            groups.push(GroupedEvent {
                showtimes: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].showtimes.push(event);
    }
    groups
}

/// One group per title and venue, in order of first appearance.
pub fn group_by_title_venue(events: &[Event]) -> Vec<GroupedEvent<'_>> {
    group_by(events.iter(), |event| {
        (event.title.clone(), event.venue.clone())
    })
}

/// Movie showtimes folded into films, keyed by title and release year.
pub fn group_films(events: &[Event]) -> Vec<GroupedEvent<'_>> {
    group_by(
        events
            .iter()
            .filter(|event| event.category == EventCategory::Movie),
        |event| (event.title.clone(), event.meta_int("year")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TIMEZONE;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn showing(title: &str, venue: &str, day: u32, category: EventCategory) -> Event {
        let date = TIMEZONE.with_ymd_and_hms(2025, 11, day, 20, 0, 0).unwrap();
        Event::new(title, date, venue, category).unwrap()
    }

    #[test]
    fn groups_preserve_first_appearance_order() {
        let events = vec![
            showing("Wicked", "Astor", 22, EventCategory::Movie),
            showing("Bugonia", "Astor", 22, EventCategory::Movie),
            showing("Wicked", "Astor", 23, EventCategory::Movie),
            showing("Wicked", "Kino am Raschplatz", 23, EventCategory::Movie),
        ];
        let groups = group_by_title_venue(&events);
        let summary: Vec<_> = groups
            .iter()
            .map(|g| (g.title(), g.venue(), g.len()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Wicked", "Astor", 2),
                ("Bugonia", "Astor", 1),
                ("Wicked", "Kino am Raschplatz", 1),
            ]
        );
        assert!(std::ptr::eq(groups[0].showtimes[1], &events[2]));
    }

    #[test]
    fn films_only_include_movies() {
        let events = vec![
            showing("Wicked", "Astor", 22, EventCategory::Movie),
            showing("Luciano", "ZAG Arena", 29, EventCategory::Radar),
            showing("Wicked", "Astor", 24, EventCategory::Movie),
        ];
        let films = group_films(&events);
        assert_eq!(films.len(), 1);
        assert_eq!(films[0].len(), 2);
        assert_eq!(events.len(), 3);
    }
}
