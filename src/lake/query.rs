use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::Serialize;

use super::{ObjectStore, TagSet};
use crate::error::{LakeError, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

// ---------------------------------------------------------------------------
// Matchers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Prefix,
    Contains,
    Regex,
    DateRange,
}

/// How one tag value is compared.
#[derive(Debug, Clone)]
pub enum TagMatcher {
    Exact(String),
    Prefix(String),
    Contains(String),
    /// Matches from the start of the value only.
    Regex(Regex),
    /// Inclusive on both ends; a missing end is unbounded.
    DateRange {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

impl TagMatcher {
    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(&format!("^(?:{pattern})"))
            .map(TagMatcher::Regex)
            .map_err(|e| LakeError::InvalidArgument(format!("bad pattern '{pattern}': {e}")))
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            TagMatcher::Exact(expected) => value == expected,
            TagMatcher::Prefix(prefix) => value.starts_with(prefix.as_str()),
            TagMatcher::Contains(needle) => value.contains(needle.as_str()),
            TagMatcher::Regex(re) => re.is_match(value),
            TagMatcher::DateRange { start, end } => {
                let Ok(date) = NaiveDate::parse_from_str(value, DATE_FORMAT) else {
                    return false;
                };
                start.map_or(true, |s| s <= date) && end.map_or(true, |e| date <= e)
            }
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            TagMatcher::Exact(v) | TagMatcher::Prefix(v) | TagMatcher::Contains(v) => v.is_empty(),
            TagMatcher::Regex(re) => re.as_str() == "^(?:)",
            TagMatcher::DateRange { .. } => false,
        }
    }
}

fn parse_date(text: &str) -> Result<Option<NaiveDate>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map(Some)
        .map_err(|e| LakeError::InvalidArgument(format!("'{text}' is not a YYYY-MM-DD date: {e}")))
}

/// A tag key together with the matcher applied to its value.
#[derive(Debug, Clone)]
pub struct TagCriterion {
    pub key: String,
    pub matcher: TagMatcher,
}

impl TagCriterion {
    pub fn new(key: impl Into<String>, matcher: TagMatcher) -> Self {
        Self {
            key: key.into(),
            matcher,
        }
    }

    /// Parse `key=value`; date ranges use `key=START..END` with either end
    /// optional.
    pub fn parse(kind: MatchKind, text: &str) -> Result<Self> {
        let (key, value) = text.split_once('=').ok_or_else(|| {
            LakeError::InvalidArgument(format!("expected KEY=VALUE, got '{text}'"))
        })?;
        let matcher = match kind {
            MatchKind::Exact => TagMatcher::Exact(value.to_string()),
            MatchKind::Prefix => TagMatcher::Prefix(value.to_string()),
            MatchKind::Contains => TagMatcher::Contains(value.to_string()),
            MatchKind::Regex => TagMatcher::regex(value)?,
            MatchKind::DateRange => {
                let (start, end) = value.split_once("..").ok_or_else(|| {
                    LakeError::InvalidArgument(format!("expected START..END, got '{value}'"))
                })?;
                TagMatcher::DateRange {
                    start: parse_date(start)?,
                    end: parse_date(end)?,
                }
            }
        };
        Ok(Self::new(key.trim(), matcher))
    }

    fn matches(&self, tags: &TagSet) -> bool {
        tags.get(&self.key)
            .is_some_and(|value| self.matcher.matches(value))
    }
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct TagQuery {
    pub criteria: Vec<TagCriterion>,
    /// Require every criterion instead of any one.
    pub match_all: bool,
}

impl TagQuery {
    fn active(&self) -> Vec<&TagCriterion> {
        self.criteria.iter().filter(|c| !c.matcher.is_empty()).collect()
    }

    /// Evaluate against an object's tags. A query without usable criteria
    /// matches nothing.
    pub fn matches(&self, tags: &TagSet) -> bool {
        let active = self.active();
        if active.is_empty() {
            return false;
        }
        if self.match_all {
            active.iter().all(|c| c.matches(tags))
        } else {
            active.iter().any(|c| c.matches(tags))
        }
    }
}

/// An object that satisfied a tag query.
#[derive(Debug, Clone, Serialize)]
pub struct TaggedObject {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub tags: TagSet,
}

/// Scan every object under `prefix` and keep those whose tags satisfy
/// `query`.
pub fn query_by_tags(store: &dyn ObjectStore, query: &TagQuery, prefix: &str) -> Result<Vec<TaggedObject>> {
    if query.active().is_empty() {
        return Ok(Vec::new());
    }

    let mut matching = Vec::new();
    for object in store.list_objects(prefix)? {
        let tags = match store.object_tags(&object.key) {
            Ok(tags) => tags,
            Err(e) => {
                log::warn!("Skipping {}: {e}", object.key);
                continue;
            }
        };
        if query.matches(&tags) {
            matching.push(TaggedObject {
                key: object.key,
                size: object.size,
                last_modified: object.last_modified,
                tags,
            });
        }
    }
    Ok(matching)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lake::memory::MemoryStore;

    fn tags(pairs: &[(&str, &str)]) -> TagSet {
        pairs.iter().copied().collect()
    }

    fn tagged_store() -> MemoryStore {
        let store = MemoryStore::with_objects([
            ("data/PXD1/a.raw", 100),
            ("data/PXD1/b.mzML", 200),
            ("data/PXD2/c.raw", 300),
        ]);
        let glioma = tags(&[("publicationDate", "2025-01-28"), ("diseases", "Brain cancer, glioma")]);
        let lymphoma = tags(&[("publicationDate", "2023-06-01"), ("diseases", "lymphoma")]);
        store.put_object_tags("data/PXD1/a.raw", &glioma).unwrap();
        store.put_object_tags("data/PXD1/b.mzML", &glioma).unwrap();
        store.put_object_tags("data/PXD2/c.raw", &lymphoma).unwrap();
        store
    }

    #[test]
    fn matchers_compare_as_documented() {
        assert!(TagMatcher::Prefix("2025".into()).matches("2025-01-28"));
        assert!(TagMatcher::Contains("glioma".into()).matches("Brain cancer, glioma"));
        assert!(!TagMatcher::Exact("glioma".into()).matches("Brain cancer, glioma"));

        let re = TagCriterion::parse(MatchKind::Regex, "diseases=glio").unwrap();
        assert!(re.matcher.matches("glioma"));
        assert!(!re.matcher.matches("Brain cancer, glioma"));
    }

    #[test]
    fn date_ranges_are_inclusive_and_reject_bad_dates() {
        let range = TagCriterion::parse(MatchKind::DateRange, "publicationDate=2025-01-01..2025-01-28")
            .unwrap()
            .matcher;
        assert!(range.matches("2025-01-28"));
        assert!(range.matches("2025-01-01"));
        assert!(!range.matches("2024-12-31"));
        assert!(!range.matches("January 2025"));

        let open = TagCriterion::parse(MatchKind::DateRange, "publicationDate=2024-01-01..").unwrap();
        assert!(open.matcher.matches("2030-01-01"));

        assert!(TagCriterion::parse(MatchKind::DateRange, "publicationDate=2025-13-01..").is_err());
        assert!(TagCriterion::parse(MatchKind::Exact, "no-equals-sign").is_err());
    }

    #[test]
    fn any_versus_all() {
        let store = tagged_store();
        let criteria = vec![
            TagCriterion::new("publicationDate", TagMatcher::Prefix("2025".into())),
            TagCriterion::new("diseases", TagMatcher::Contains("lymphoma".into())),
        ];

        let any = TagQuery {
            criteria: criteria.clone(),
            match_all: false,
        };
        assert_eq!(query_by_tags(&store, &any, "").unwrap().len(), 3);

        let all = TagQuery {
            criteria,
            match_all: true,
        };
        assert!(query_by_tags(&store, &all, "").unwrap().is_empty());
    }

    #[test]
    fn empty_values_are_dropped_and_missing_tags_fail() {
        let store = tagged_store();
        let query = TagQuery {
            criteria: vec![
                TagCriterion::new("instruments", TagMatcher::Contains(String::new())),
                TagCriterion::new("diseases", TagMatcher::Contains("glioma".into())),
            ],
            match_all: true,
        };
        let keys: Vec<_> = query_by_tags(&store, &query, "data/")
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(keys, vec!["data/PXD1/a.raw", "data/PXD1/b.mzML"]);

        let missing = TagQuery {
            criteria: vec![TagCriterion::new("species", TagMatcher::Exact("Homo sapiens".into()))],
            match_all: false,
        };
        assert!(query_by_tags(&store, &missing, "").unwrap().is_empty());

        let nothing = TagQuery {
            criteria: vec![TagCriterion::new("diseases", TagMatcher::Exact(String::new()))],
            match_all: false,
        };
        assert!(query_by_tags(&store, &nothing, "").unwrap().is_empty());
    }

    #[test]
    fn unreadable_tags_skip_the_object() {
        let mut store = tagged_store();
        store.broken.push("data/PXD2/c.raw".into());
        let query = TagQuery {
            criteria: vec![TagCriterion::new("publicationDate", TagMatcher::Prefix("20".into()))],
            match_all: false,
        };
        assert_eq!(query_by_tags(&store, &query, "").unwrap().len(), 2);
    }
}
