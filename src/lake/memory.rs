use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;

use super::{ObjectStore, ObjectSummary, TagSet};
use crate::error::{LakeError, Result};

/// In-memory [`ObjectStore`] for tests.
#[derive(Default)]
pub struct MemoryStore {
    objects: RefCell<BTreeMap<String, (u64, TagSet)>>,
    /// Keys whose tag operations fail.
    pub broken: Vec<String>,
}

impl MemoryStore {
    pub fn with_objects<'a>(objects: impl IntoIterator<Item = (&'a str, u64)>) -> Self {
        let store = Self::default();
        for (key, size) in objects {
            store
                .objects
                .borrow_mut()
                .insert(key.to_string(), (size, TagSet::new()));
        }
        store
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.borrow().keys().cloned().collect()
    }

    pub fn tags(&self, key: &str) -> Option<TagSet> {
        self.objects.borrow().get(key).map(|(_, t)| t.clone())
    }

    fn check(&self, key: &str) -> Result<()> {
        if self.broken.iter().any(|k| k == key) {
            return Err(LakeError::Store(format!("{key}: access denied")));
        }
        Ok(())
    }
}

impl ObjectStore for MemoryStore {
    fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>> {
        Ok(self
            .objects
            .borrow()
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, (size, _))| ObjectSummary {
                key: k.clone(),
                size: *size,
                last_modified: None,
            })
            .collect())
    }

    fn list_prefixes(&self, prefix: &str, delimiter: &str) -> Result<Vec<String>> {
        let mut prefixes: Vec<String> = Vec::new();
        for key in self.objects.borrow().keys() {
            let Some(rest) = key.strip_prefix(prefix) else {
                continue;
            };
            if let Some(pos) = rest.find(delimiter) {
                let common = format!("{prefix}{}", &rest[..pos + delimiter.len()]);
                if !prefixes.contains(&common) {
                    prefixes.push(common);
                }
            }
        }
        Ok(prefixes)
    }

    fn object_tags(&self, key: &str) -> Result<TagSet> {
        self.check(key)?;
        self.objects
            .borrow()
            .get(key)
            .map(|(_, t)| t.clone())
            .ok_or_else(|| LakeError::Store(format!("no such key: {key}")))
    }

    fn put_object_tags(&self, key: &str, tags: &TagSet) -> Result<()> {
        self.check(key)?;
        match self.objects.borrow_mut().get_mut(key) {
            Some(entry) => {
                entry.1 = tags.clone();
                Ok(())
            }
            None => Err(LakeError::Store(format!("no such key: {key}"))),
        }
    }

    fn upload_file(&self, path: &Path, key: &str) -> Result<()> {
        let size = std::fs::metadata(path)?.len();
        self.objects
            .borrow_mut()
            .insert(key.to_string(), (size, TagSet::new()));
        Ok(())
    }
}
