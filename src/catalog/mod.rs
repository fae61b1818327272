//! Remote dataset catalogs: PRIDE Archive, ProteomeCentral (ProteomeExchange)
//! and MassIVE.
//!
//! The catalogs are third-party services consumed as-is; the types here keep
//! only the fields the tools read and default everything else.

pub mod massive;
pub mod pride;
pub mod proteomexchange;

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::error::{LakeError, Result};

// ---------------------------------------------------------------------------
// Dataset – a catalog entry
// ---------------------------------------------------------------------------

/// A dataset listed by a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub accession: String,
    pub title: String,
    pub publication_date: Option<String>,
    pub description: String,
    /// Download locations (FTP folder, file URLs).
    pub links: Vec<String>,
}

// ---------------------------------------------------------------------------
// PRIDE file listing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatasetFile {
    pub file_name: String,
    pub file_size_bytes: u64,
    pub public_file_locations: Vec<FileLocation>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FileLocation {
    pub name: String,
    pub value: String,
}

impl DatasetFile {
    /// First published location, usually the FTP copy.
    pub fn download_url(&self) -> Option<&str> {
        self.public_file_locations
            .iter()
            .map(|l| l.value.as_str())
            .find(|v| !v.is_empty())
    }
}

// ---------------------------------------------------------------------------
// PRIDE project document
// ---------------------------------------------------------------------------

/// The parts of a PRIDE v3 project document used for metadata and tags.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectDetails {
    pub accession: String,
    pub title: String,
    pub project_description: String,
    pub publication_date: String,
    pub doi: String,
    pub keywords: Vec<String>,
    pub submission_type: String,
    pub submitters: Vec<Contact>,
    pub affiliations: Vec<String>,
    pub instruments: Vec<CvTerm>,
    pub softwares: Vec<CvTerm>,
    pub organisms: Vec<CvTerm>,
    pub organisms_part: Vec<CvTerm>,
    pub diseases: Vec<CvTerm>,
    pub references: Vec<Reference>,
    /// A free-text string in v3, a list in some older documents.
    pub highlights: serde_json::Value,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Contact {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CvTerm {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Reference {
    pub doi: Option<String>,
    pub pubmed_id: Option<i64>,
}

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

/// Per-accession lookups against a project archive.
pub trait ProjectCatalog {
    fn project_details(&self, accession: &str) -> Result<ProjectDetails>;

    fn project_files(&self, accession: &str) -> Result<Vec<DatasetFile>>;
}

/// Keyword search returning catalog entries.
pub trait DatasetSource {
    fn search(&self, term: &str) -> Result<Vec<Dataset>>;
}

// ---------------------------------------------------------------------------
// Shared HTTP plumbing
// ---------------------------------------------------------------------------

pub(crate) fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(120))
        .user_agent(format!("proteolake/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| LakeError::http("<client>", e))
}

/// GET `url` as JSON, mapping non-200 answers to [`LakeError::Status`].
pub(crate) fn get_json<T: serde::de::DeserializeOwned>(client: &Client, url: &str) -> Result<T> {
    let response = client
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .map_err(|e| LakeError::http(url, e))?;
    let status = response.status();
    if !status.is_success() {
        log::debug!("{url}: {}", response.text().unwrap_or_default());
        return Err(LakeError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    response.json().map_err(|e| LakeError::http(url, e))
}
