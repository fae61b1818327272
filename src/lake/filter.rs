use super::query::TaggedObject;

// ---------------------------------------------------------------------------
// Post-query filtering of tag-query results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Key,
    LastModified,
    Size,
}

/// Narrowing applied after a tag query. Every unset field means "no
/// constraint".
#[derive(Debug, Clone, Default)]
pub struct ResultFilter {
    /// Case-insensitive key suffixes, e.g. `.raw`.
    pub extensions: Vec<String>,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    pub sort_by: Option<SortKey>,
    pub limit: Option<usize>,
}

impl ResultFilter {
    fn keeps(&self, object: &TaggedObject) -> bool {
        if !self.extensions.is_empty() {
            let key = object.key.to_lowercase();
            if !self
                .extensions
                .iter()
                .any(|ext| key.ends_with(&ext.to_lowercase()))
            {
                return false;
            }
        }
        if self.min_size.is_some_and(|min| object.size < min) {
            return false;
        }
        if self.max_size.is_some_and(|max| object.size > max) {
            return false;
        }
        true
    }

    /// Extension, size bounds, sort, then limit, in that order.
    pub fn apply(&self, results: Vec<TaggedObject>) -> Vec<TaggedObject> {
        let mut kept: Vec<TaggedObject> = results.into_iter().filter(|o| self.keeps(o)).collect();

        match self.sort_by {
            Some(SortKey::Key) => kept.sort_by(|a, b| a.key.cmp(&b.key)),
            Some(SortKey::LastModified) => kept.sort_by_key(|o| o.last_modified),
            Some(SortKey::Size) => kept.sort_by_key(|o| o.size),
            None => {}
        }

        if let Some(limit) = self.limit.filter(|&n| n > 0) {
            kept.truncate(limit);
        }
        kept
    }
}
