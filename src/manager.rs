use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::catalog::pride::{PrideClient, SearchQuery};
use crate::catalog::{DatasetFile, ProjectCatalog};
use crate::download::{Downloader, already_present};
use crate::error::Result;
use crate::lake::ObjectStore;
use crate::metadata::{DatasetMetadata, directory_size_gb, extract_metadata};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Where files land locally and in the object store.
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    pub output_dir: PathBuf,
    pub data_prefix: String,
    pub metadata_prefix: String,
    /// Pause between datasets.
    pub request_delay: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./pride_data"),
            data_prefix: "data/".into(),
            metadata_prefix: "metadata/".into(),
            request_delay: Duration::from_secs(1),
        }
    }
}

/// What to fetch for each dataset.
#[derive(Debug, Clone, Default)]
pub struct DatasetRequest {
    /// Metadata values that replace the extracted ones, by JSON key.
    pub overrides: BTreeMap<String, String>,
    pub max_files: Option<usize>,
    /// Case-insensitive file-name suffixes, e.g. `raw`, `.mzML`.
    pub file_types: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadSummary {
    pub succeeded: usize,
    pub total: usize,
}

impl DownloadSummary {
    pub fn is_success(&self) -> bool {
        self.succeeded > 0
    }
}

/// Apply the suffix filter, then cap the count.
pub fn select_files(files: Vec<DatasetFile>, file_types: &[String], max_files: Option<usize>) -> Vec<DatasetFile> {
    let mut files: Vec<DatasetFile> = if file_types.is_empty() {
        files
    } else {
        let suffixes: Vec<String> = file_types.iter().map(|t| t.to_lowercase()).collect();
        files
            .into_iter()
            .filter(|f| {
                let name = f.file_name.to_lowercase();
                suffixes.iter().any(|s| name.ends_with(s.as_str()))
            })
            .collect()
    };

    if let Some(max) = max_files.filter(|&m| m > 0) {
        if files.len() > max {
            log::info!("Limiting download to {max} of {} files", files.len());
            files.truncate(max);
        }
    }
    files
}

// ---------------------------------------------------------------------------
// PrideDatasetManager
// ---------------------------------------------------------------------------

/// Downloads PRIDE datasets, writes their data-lake metadata and mirrors
/// both to the object store when one is configured.
pub struct PrideDatasetManager<C> {
    catalog: C,
    downloader: Downloader,
    store: Option<Box<dyn ObjectStore>>,
    options: ManagerOptions,
}

impl<C: ProjectCatalog> PrideDatasetManager<C> {
    pub fn new(
        catalog: C,
        downloader: Downloader,
        store: Option<Box<dyn ObjectStore>>,
        options: ManagerOptions,
    ) -> Result<Self> {
        fs::create_dir_all(&options.output_dir)?;
        Ok(Self {
            catalog,
            downloader,
            store,
            options,
        })
    }

    fn dataset_dir(&self, accession: &str) -> PathBuf {
        self.options.output_dir.join(accession)
    }

    /// Fetch the selected files of one dataset into `<output_dir>/<accession>/`.
    pub fn download_dataset(
        &self,
        accession: &str,
        max_files: Option<usize>,
        file_types: &[String],
    ) -> Result<DownloadSummary> {
        let files = self.catalog.project_files(accession)?;
        if files.is_empty() {
            log::warn!("No files found for dataset {accession}");
            return Ok(DownloadSummary {
                succeeded: 0,
                total: 0,
            });
        }

        let files = select_files(files, file_types, max_files);
        let dataset_dir = self.dataset_dir(accession);
        fs::create_dir_all(&dataset_dir)?;

        let mut succeeded = 0;
        for file in &files {
            let Some(url) = file.download_url() else {
                log::warn!("No download URL for file {}", file.file_name);
                continue;
            };
            let output_path = dataset_dir.join(&file.file_name);

            if already_present(&output_path) {
                log::info!("File already exists, skipping: {}", output_path.display());
                succeeded += 1;
                continue;
            }

            log::info!("Downloading {}...", file.file_name);
            if let Err(e) = self.downloader.fetch(url, &output_path) {
                log::error!("Error downloading {url}: {e}");
                continue;
            }
            succeeded += 1;

            if let Some(store) = &self.store {
                let key = format!("{}{accession}/{}", self.options.data_prefix, file.file_name);
                log::info!("Uploading to object store: {key}");
                if let Err(e) = store.upload_file(&output_path, &key) {
                    log::error!("Error uploading {key}: {e}");
                }
            }
        }

        log::info!(
            "Downloaded {succeeded} of {} files for dataset {accession}",
            files.len()
        );
        Ok(DownloadSummary {
            succeeded,
            total: files.len(),
        })
    }

    /// Metadata, download, size and upload for one accession. Failures are
    /// logged; the return value says whether the dataset made it.
    pub fn process_dataset(&self, accession: &str, request: &DatasetRequest) -> bool {
        log::info!("Processing dataset {accession}...");

        let details = match self.catalog.project_details(accession) {
            Ok(details) => details,
            Err(e) => {
                log::error!("Failed to get details for dataset {accession}: {e}");
                return false;
            }
        };

        let mut metadata = extract_metadata(&details);
        for key in metadata.apply_overrides(&request.overrides) {
            log::warn!("Ignoring unknown metadata override '{key}'");
        }

        let summary = match self.download_dataset(accession, request.max_files, &request.file_types) {
            Ok(summary) => summary,
            Err(e) => {
                log::error!("Failed to list files for dataset {accession}: {e}");
                return false;
            }
        };
        if !summary.is_success() {
            log::error!("Failed to download dataset {accession}");
            return false;
        }

        let dataset_dir = self.dataset_dir(accession);
        match self.write_metadata(accession, &dataset_dir, &mut metadata) {
            Ok(()) => {
                log::info!("Dataset {accession} processed successfully");
                true
            }
            Err(e) => {
                log::error!("Failed to write metadata for {accession}: {e}");
                false
            }
        }
    }

    fn write_metadata(
        &self,
        accession: &str,
        dataset_dir: &Path,
        metadata: &mut DatasetMetadata,
    ) -> Result<()> {
        metadata.dataset_size_gb = directory_size_gb(dataset_dir)?;

        let file_name = format!("{accession}_metadata.json");
        let path = dataset_dir.join(&file_name);
        fs::write(&path, serde_json::to_string_pretty(metadata)?)?;

        if let Some(store) = &self.store {
            let key = format!("{}{accession}/{file_name}", self.options.metadata_prefix);
            match store.upload_file(&path, &key) {
                Ok(()) => log::info!("Uploaded metadata to object store: {key}"),
                Err(e) => log::error!("Error uploading metadata {key}: {e}"),
            }
        }
        Ok(())
    }

    /// Process accessions in order with the politeness delay between them.
    /// Returns how many succeeded.
    pub fn process_all<'a>(
        &self,
        accessions: impl IntoIterator<Item = &'a str>,
        request: &DatasetRequest,
    ) -> usize {
        let mut processed = 0;
        for (i, accession) in accessions.into_iter().enumerate() {
            if i > 0 && !self.options.request_delay.is_zero() {
                thread::sleep(self.options.request_delay);
            }
            if self.process_dataset(accession, request) {
                processed += 1;
            }
        }
        processed
    }
}

impl PrideDatasetManager<PrideClient> {
    /// Search PRIDE and process up to `max_datasets` hits.
    pub fn run(&self, query: &SearchQuery, max_datasets: usize, request: &DatasetRequest) -> Result<usize> {
        let hits = self.catalog.search_paginated(query, max_datasets)?;
        let accessions: Vec<String> = hits.into_iter().filter_map(|h| h.accession).collect();
        Ok(self.process_all(accessions.iter().map(String::as_str), request))
    }
}
