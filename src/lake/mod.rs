//! The S3 data lake: object listing, tagging of PRIDE folders and tag-based
//! queries.
//!
//! ```text
//! data/PXD012345/S1.raw   ─┐
//! data/PXD012345/S2.raw   ─┼─ tag_pride_datasets ──▶ object tags (≤ 10)
//! metadata/PXD012345/...  ─┘                               │
//!                                                          ▼
//!                               query_by_tags ──▶ ResultFilter ──▶ report
//! ```

pub mod filter;
#[cfg(test)]
pub mod memory;
pub mod query;
pub mod s3;
pub mod tags;

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::error::Result;

/// S3 allows at most ten tags per object.
pub const MAX_TAGS: usize = 10;

// ---------------------------------------------------------------------------
// Object listing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// TagSet
// ---------------------------------------------------------------------------

/// Ordered key/value tags. Insertion order is kept so that truncation to
/// [`MAX_TAGS`] drops the least important entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    entries: Vec<(String, String)>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a tag. Empty values are not stored.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if value.is_empty() {
            return;
        }
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The first [`MAX_TAGS`] entries.
    pub fn limited(&self) -> TagSet {
        if self.entries.len() > MAX_TAGS {
            log::warn!(
                "More than {MAX_TAGS} tags generated ({}). Keeping the first {MAX_TAGS}.",
                self.entries.len()
            );
        }
        TagSet {
            entries: self.entries.iter().take(MAX_TAGS).cloned().collect(),
        }
    }
}

impl Serialize for TagSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tags = TagSet::new();
        for (k, v) in iter {
            tags.insert(k, v);
        }
        tags
    }
}

// ---------------------------------------------------------------------------
// Store seam
// ---------------------------------------------------------------------------

/// The object-store operations the lake tools need.
pub trait ObjectStore {
    /// Every object under `prefix`, across all listing pages.
    fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>>;

    /// Common prefixes ("folders") directly under `prefix`.
    fn list_prefixes(&self, prefix: &str, delimiter: &str) -> Result<Vec<String>>;

    fn object_tags(&self, key: &str) -> Result<TagSet>;

    /// Replace the object's tag set.
    fn put_object_tags(&self, key: &str, tags: &TagSet) -> Result<()>;

    fn upload_file(&self, path: &Path, key: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_set_keeps_insertion_order_and_skips_empty() {
        let mut tags = TagSet::new();
        tags.insert("accession", "PXD1");
        tags.insert("doi", "");
        tags.insert("title", "Glioma");
        tags.insert("accession", "PXD2");

        let pairs: Vec<_> = tags.iter().collect();
        assert_eq!(pairs, vec![("accession", "PXD2"), ("title", "Glioma")]);
        assert_eq!(tags.get("doi"), None);
    }

    #[test]
    fn limited_keeps_the_first_ten() {
        let tags: TagSet = (0..12).map(|i| (format!("k{i}"), "v")).collect();
        let limited = tags.limited();
        assert_eq!(limited.len(), MAX_TAGS);
        assert_eq!(limited.get("k9"), Some("v"));
        assert_eq!(limited.get("k10"), None);
    }
}
