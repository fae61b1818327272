use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use rayon::prelude::*;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::catalog::{get_json, http_client};
use crate::error::{LakeError, Result};

pub type Keywords = BTreeMap<String, String>;

const PRIDE_FIELDS: &[&str] = &["accession", "title", "species", "instrument", "experimentType", "publicationDate"];
const MASSIVE_FIELDS: &[&str] = &["id", "title", "organism", "instrument", "date", "description"];
const FIELD_ALTERNATIVES: &[(&str, &[&str])] = &[
    ("species", &["organism", "taxonomy"]),
    ("experimentType", &["experiment", "type"]),
    ("instrument", &["machine", "mass spec"]),
];

// ---------------------------------------------------------------------------
// Keywords
// ---------------------------------------------------------------------------

/// Read a flat JSON object; non-string values keep their JSON text.
pub fn load_keywords(path: &Path) -> Result<Keywords> {
    let text = fs::read_to_string(path)?;
    let object: serde_json::Map<String, Value> = serde_json::from_str(&text)?;
    Ok(object
        .into_iter()
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (k, value)
        })
        .collect())
}

/// Rename user-friendly keys onto the API field names; unknown keys are
/// kept and reported.
pub fn normalize_keywords(mut keywords: Keywords) -> Keywords {
    let keys: Vec<String> = keywords.keys().cloned().collect();
    for key in keys {
        if PRIDE_FIELDS.contains(&key.as_str()) || MASSIVE_FIELDS.contains(&key.as_str()) {
            continue;
        }
        let target = FIELD_ALTERNATIVES
            .iter()
            .find(|(_, alternatives)| alternatives.contains(&key.as_str()))
            .map(|(field, _)| *field);
        match target {
            Some(field) => {
                log::info!("Mapping '{key}' to '{field}'");
                if let Some(value) = keywords.remove(&key) {
                    keywords.insert(field.to_string(), value);
                }
            }
            None => log::warn!("'{key}' is not a recognized field in PRIDE or MASSIVE."),
        }
    }
    keywords
}

// ---------------------------------------------------------------------------
// Legacy PRIDE archive API
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProjectSearch {
    projects: Vec<ProjectHit>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProjectHit {
    accession: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LegacyFile {
    file_name: String,
    download_link: String,
}

/// Lists the RAW files of one project.
pub trait RawFileLister {
    fn fetch_raw_files(&self, project: &str) -> Result<Vec<String>>;
}

pub struct LegacyPrideClient {
    client: Client,
    base_url: String,
}

impl LegacyPrideClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: format!("{}/", base_url.trim_end_matches('/')),
        })
    }

    /// Accessions of projects matching the species and experiment type.
    pub fn fetch_projects(&self, keywords: &Keywords) -> Result<Vec<String>> {
        let endpoint = format!("{}project/search", self.base_url);
        let field = |k: &str| keywords.get(k).map(String::as_str).unwrap_or("");
        let url = reqwest::Url::parse_with_params(
            &endpoint,
            &[("q", field("species")), ("experimentType", field("experimentType"))],
        )
        .map_err(|e| LakeError::InvalidArgument(format!("{endpoint}: {e}")))?;

        let search: ProjectSearch = get_json(&self.client, url.as_str())?;
        Ok(search
            .projects
            .into_iter()
            .map(|p| p.accession)
            .filter(|a| !a.is_empty())
            .collect())
    }
}

impl RawFileLister for LegacyPrideClient {
    fn fetch_raw_files(&self, project: &str) -> Result<Vec<String>> {
        let url = format!("{}file/list/project/{project}", self.base_url);
        let files: Vec<LegacyFile> = get_json(&self.client, &url)?;
        Ok(raw_links(files))
    }
}

fn raw_links(files: Vec<LegacyFile>) -> Vec<String> {
    files
        .into_iter()
        .filter(|f| f.file_name.to_lowercase().ends_with(".raw") && !f.download_link.is_empty())
        .map(|f| f.download_link)
        .collect()
}

/// RAW file URLs of every project, fetched on a pool of 2 × CPU threads.
/// A project whose listing fails contributes nothing.
pub fn collect_raw_file_urls<L>(lister: &L, projects: &[String]) -> Result<Vec<String>>
where
    L: RawFileLister + Sync,
{
    let threads = std::thread::available_parallelism().map_or(1, |n| n.get()) * 2;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| LakeError::InvalidArgument(format!("thread pool: {e}")))?;

    let per_project: Vec<Vec<String>> = pool.install(|| {
        projects
            .par_iter()
            .map(|project| match lister.fetch_raw_files(project) {
                Ok(urls) => urls,
                Err(e) => {
                    log::error!("Error listing files of {project}: {e}");
                    Vec::new()
                }
            })
            .collect()
    });
    Ok(per_project.into_iter().flatten().collect())
}
