//! Deterministic, pure parsing of raw activity records into
//! [`ParsedActivity`], grounded on `pipeline.py::parse_title` /
//! `extract_location` and `extraction.py::extract_notification_topics`.
//!
//! Nothing in this module touches the database, the extractor, or the clock;
//! every function here is a total, side-effect-free mapping from input
//! fields to output fields, which keeps activity parsing exactly
//! reproducible from one run to the next.

use serde::{Deserialize, Serialize};

/// One `subtitles[*]` entry of a raw activity record.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Subtitle {
    /// The subtitle text. Empty string if the source field was missing.
    #[serde(default)]
    pub name: String,
}

/// One `locationInfos[*]` entry of a raw activity record.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocationInfo {
    /// Free-text source description, e.g. `"Home (inferred)"`.
    #[serde(default)]
    pub source: String,
}

/// A raw activity record as it appears in the input JSON array.
/// Deserialized as-is; normalization happens in [`parse_title`] /
/// [`extract_location`] / [`extract_notification_topics`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawActivity {
    /// The activity's headline text, e.g. `"Searched for paris"`.
    pub title: String,
    /// Notification topic list, present only on notification entries.
    #[serde(default)]
    pub subtitles: Option<Vec<Subtitle>>,
    /// Location hints, present only when the source recorded one.
    #[serde(default, rename = "locationInfos")]
    pub location_infos: Option<Vec<LocationInfo>>,
    /// ISO-8601 timestamp, `Z` suffix allowed.
    pub time: String,
}

/// The classified kind of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    /// `"Searched for ..."`.
    Searched,
    /// `"Visited ..."`.
    Visited,
    /// `"Viewed ..."`.
    Viewed,
    /// `"1 notification"`.
    Notification,
    /// Anything that doesn't match a known prefix or exact title.
    Unknown,
}

/// The normalized result of parsing one raw activity's `title`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedActivity {
    /// The classified activity kind.
    pub activity_type: ActivityType,
    /// The search query, URL, place name, or topic — empty for entries with
    /// no extractable content (notifications, `"Used Search"`, etc).
    pub content: String,
    /// The original, unmodified `title` field.
    pub raw_title: String,
}

/// Normalized location bucket for a witness-complex location simplex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WitnessLocation {
    /// Source string contained `"Home"`.
    Home,
    /// Source string contained `"Work"`.
    Work,
    /// Present but neither home nor work.
    Other,
}

impl WitnessLocation {
    /// The lowercase string used as the simplex metadata's `location` field
    /// and as the witness builder's per-location map key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Work => "work",
            Self::Other => "other",
        }
    }
}

/// Parses `title` into a [`ParsedActivity`], applying the classification
/// rules in order — first match wins.
#[must_use]
pub fn parse_title(title: &str) -> ParsedActivity {
    const SEARCHED_PREFIX: &str = "Searched for ";
    const VISITED_PREFIX: &str = "Visited ";
    const VIEWED_PREFIX: &str = "Viewed ";

    if let Some(content) = title.strip_prefix(SEARCHED_PREFIX) {
        return ParsedActivity {
            activity_type: ActivityType::Searched,
            content: content.to_string(),
            raw_title: title.to_string(),
        };
    }
    if let Some(content) = title.strip_prefix(VISITED_PREFIX) {
        return ParsedActivity {
            activity_type: ActivityType::Visited,
            content: content.to_string(),
            raw_title: title.to_string(),
        };
    }
    if let Some(content) = title.strip_prefix(VIEWED_PREFIX) {
        return ParsedActivity {
            activity_type: ActivityType::Viewed,
            content: content.to_string(),
            raw_title: title.to_string(),
        };
    }
    if title == "1 notification" {
        return ParsedActivity {
            activity_type: ActivityType::Notification,
            content: String::new(),
            raw_title: title.to_string(),
        };
    }
    if title == "Used Search" || title == "Ran internet speed test" {
        return ParsedActivity {
            activity_type: ActivityType::Unknown,
            content: String::new(),
            raw_title: title.to_string(),
        };
    }
    ParsedActivity {
        activity_type: ActivityType::Unknown,
        content: title.to_string(),
        raw_title: title.to_string(),
    }
}

/// Extracts notification topics from `subtitles`: every `name` that is
/// neither empty nor the literal header `"Including topics:"`.
#[must_use]
pub fn extract_notification_topics(subtitles: Option<&[Subtitle]>) -> Vec<String> {
    let Some(subtitles) = subtitles else {
        return Vec::new();
    };
    subtitles
        .iter()
        .filter(|s| !s.name.is_empty() && s.name != "Including topics:")
        .map(|s| s.name.clone())
        .collect()
}

/// Normalizes `location_infos[0].source` into a [`WitnessLocation`] bucket,
/// or `None` if the activity carries no location hint at all.
#[must_use]
pub fn extract_location(location_infos: Option<&[LocationInfo]>) -> Option<WitnessLocation> {
    let first = location_infos?.first()?;
    if first.source.contains("Home") {
        Some(WitnessLocation::Home)
    } else if first.source.contains("Work") {
        Some(WitnessLocation::Work)
    } else {
        Some(WitnessLocation::Other)
    }
}

/// Normalizes an ISO-8601 timestamp's trailing `Z` to `+00:00`, matching
/// `pipeline.py::parse_timestamp`'s `time_str.replace("Z", "+00:00")`.
#[must_use]
pub fn normalize_timestamp(raw: &str) -> String {
    if let Some(stripped) = raw.strip_suffix('Z') {
        format!("{stripped}+00:00")
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_searched() {
        let p = parse_title("Searched for best restaurants jodhpur");
        assert_eq!(p.activity_type, ActivityType::Searched);
        assert_eq!(p.content, "best restaurants jodhpur");
    }

    #[test]
    fn parses_visited() {
        let p = parse_title("Visited Jules & Jim Hotel");
        assert_eq!(p.activity_type, ActivityType::Visited);
        assert_eq!(p.content, "Jules & Jim Hotel");
    }

    #[test]
    fn parses_viewed() {
        let p = parse_title("Viewed Indana Palace Jodhpur");
        assert_eq!(p.activity_type, ActivityType::Viewed);
        assert_eq!(p.content, "Indana Palace Jodhpur");
    }

    #[test]
    fn parses_notification() {
        let p = parse_title("1 notification");
        assert_eq!(p.activity_type, ActivityType::Notification);
        assert_eq!(p.content, "");
    }

    #[test]
    fn parses_known_unknown_titles() {
        for title in ["Used Search", "Ran internet speed test"] {
            let p = parse_title(title);
            assert_eq!(p.activity_type, ActivityType::Unknown);
            assert_eq!(p.content, "");
        }
    }

    #[test]
    fn parses_fallthrough_unknown() {
        let p = parse_title("Something else entirely");
        assert_eq!(p.activity_type, ActivityType::Unknown);
        assert_eq!(p.content, "Something else entirely");
    }

    #[test]
    fn notification_topics_filter_header_and_empty() {
        let subtitles = vec![
            Subtitle { name: "Including topics:".to_string() },
            Subtitle { name: "Sports".to_string() },
            Subtitle { name: String::new() },
            Subtitle { name: "Weather".to_string() },
        ];
        assert_eq!(
            extract_notification_topics(Some(&subtitles)),
            vec!["Sports".to_string(), "Weather".to_string()]
        );
    }

    #[test]
    fn notification_topics_empty_when_absent() {
        assert!(extract_notification_topics(None).is_empty());
    }

    #[test]
    fn location_buckets() {
        let home = vec![LocationInfo { source: "Home (inferred)".to_string() }];
        let work = vec![LocationInfo { source: "Work address".to_string() }];
        let other = vec![LocationInfo { source: "Somewhere else".to_string() }];
        assert_eq!(extract_location(Some(&home)), Some(WitnessLocation::Home));
        assert_eq!(extract_location(Some(&work)), Some(WitnessLocation::Work));
        assert_eq!(extract_location(Some(&other)), Some(WitnessLocation::Other));
        assert_eq!(extract_location(None), None);
        assert_eq!(extract_location(Some(&[])), None);
    }

    #[test]
    fn timestamp_z_suffix_normalized() {
        assert_eq!(normalize_timestamp("2024-01-01T10:00:00Z"), "2024-01-01T10:00:00+00:00");
        assert_eq!(normalize_timestamp("2024-01-01T10:00:00+05:00"), "2024-01-01T10:00:00+05:00");
    }
}
