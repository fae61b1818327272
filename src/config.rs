use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "proteolake.toml";

// ---------------------------------------------------------------------------
// Configuration sections
// ---------------------------------------------------------------------------

/// Tool-wide configuration. Every section has working defaults, so an
/// absent file is not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pride: PrideConfig,
    pub massive: MassiveConfig,
    pub storage: StorageConfig,
    pub monitor: MonitorConfig,
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrideConfig {
    /// PRIDE Archive REST API (v3).
    pub base_url: String,
    /// Pre-v3 archive API used by the keyword scraper.
    pub legacy_base_url: String,
    /// Pause between consecutive datasets.
    pub request_delay_secs: u64,
}

impl Default for PrideConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.ebi.ac.uk/pride/ws/archive/v3".to_string(),
            legacy_base_url: "https://www.ebi.ac.uk/pride/ws/archive/".to_string(),
            request_delay_secs: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MassiveConfig {
    pub base_url: String,
}

impl Default for MassiveConfig {
    fn default() -> Self {
        Self {
            base_url: "https://massive.ucsd.edu/ProteoSAFe/proxi/v0.1/datasets".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub bucket: Option<String>,
    pub region: Option<String>,
    /// Key prefix for raw files: `<data_prefix><accession>/<file>`.
    pub data_prefix: String,
    /// Key prefix for metadata documents.
    pub metadata_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            region: None,
            data_prefix: "data/".to_string(),
            metadata_prefix: "metadata/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub endpoint: String,
    pub search_terms: Vec<String>,
    pub check_interval_hours: u64,
    /// Datasets published within this window count as new.
    pub time_window_hours: i64,
    pub max_hits: usize,
    pub download_dir: PathBuf,
    pub log_file: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://proteomecentral.proteomexchange.org/cgi/GetDataset".to_string(),
            search_terms: [
                "pediatric cancer",
                "childhood cancer",
                "pediatric tumor",
                "pediatric oncology",
                "pediatric immunopeptidomics",
                "pediatric proteomics",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            check_interval_hours: 24,
            time_window_hours: 48,
            max_hits: 100,
            download_dir: PathBuf::from("datasets"),
            log_file: PathBuf::from("proteome_monitor.log"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub address: String,
    pub password: String,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub imap_server: String,
    pub imap_port: u16,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            password: String::new(),
            smtp_server: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            imap_server: "imap.gmail.com".to_string(),
            imap_port: 993,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load from `path`, or from [`DEFAULT_CONFIG_FILE`] if it exists, then
    /// apply `PROTEOLAKE_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Secrets and the bucket are usually supplied through the environment.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("PROTEOLAKE_EMAIL_ADDRESS") {
            self.email.address = v;
        }
        if let Some(v) = lookup("PROTEOLAKE_EMAIL_PASSWORD") {
            self.email.password = v;
        }
        if let Some(v) = lookup("PROTEOLAKE_S3_BUCKET") {
            self.storage.bucket = Some(v);
        }
        if let Some(v) = lookup("PROTEOLAKE_S3_REGION") {
            self.storage.region = Some(v);
        }
    }
}
