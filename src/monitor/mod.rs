//! ProteomeExchange discovery agent: poll for new pediatric-cancer datasets,
//! ask for approval by e-mail and record the approved ones.

pub mod mail;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::thread;
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime, TimeDelta};
use regex::Regex;

use crate::catalog::{Dataset, DatasetSource};
use crate::error::Result;
use mail::ApprovalChannel;

pub const SUBJECT_PREFIX: &str = "New Pediatric Cancer Dataset Found";

const PEDIATRIC_TERMS: &[&str] = &["pediatric", "childhood", "child", "children", "young", "infant"];
const CANCER_TERMS: &[&str] = &["cancer", "tumor", "neoplasm", "oncology", "malignancy"];

static SUBJECT_ACCESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"New Pediatric Cancer Dataset Found: (PXD\d+)").expect("valid regex")
});
static YES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\byes\b").expect("valid regex"));
static NO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bno\b").expect("valid regex"));

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Search every term and merge the hits, keeping the first record per
/// accession.
pub fn collect_datasets(source: &dyn DatasetSource, terms: &[String]) -> Vec<Dataset> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for term in terms {
        log::info!("Searching for term: {term}");
        match source.search(term) {
            Ok(datasets) => {
                for dataset in datasets {
                    if seen.insert(dataset.accession.clone()) {
                        unique.push(dataset);
                    }
                }
            }
            Err(e) => log::error!("Error fetching data for term '{term}': {e}"),
        }
    }
    unique
}

/// Published on or after the calendar day of `now - window_hours`.
pub fn is_recent(dataset: &Dataset, window_hours: i64, now: NaiveDateTime) -> bool {
    let Some(date) = dataset.publication_date.as_deref() else {
        return false;
    };
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(published) => published >= (now - TimeDelta::hours(window_hours)).date(),
        Err(_) => {
            log::warn!("Could not parse publication date for dataset {}", dataset.accession);
            false
        }
    }
}

pub fn is_pediatric_cancer(dataset: &Dataset) -> bool {
    let text = format!(
        "{}\n{}",
        dataset.title.to_lowercase(),
        dataset.description.to_lowercase()
    );
    let any = |terms: &[&str]| terms.iter().any(|t| text.contains(t));

    let pediatric = any(PEDIATRIC_TERMS);
    let cancer = any(CANCER_TERMS);
    let proteomics = text.contains("proteom");
    let immunopeptidomics = text.contains("immunopeptid") || text.contains("hla");
    pediatric && cancer && (proteomics || immunopeptidomics)
}

// ---------------------------------------------------------------------------
// Notification and replies
// ---------------------------------------------------------------------------

pub fn notification_subject(dataset: &Dataset) -> String {
    format!("{SUBJECT_PREFIX}: {}", dataset.accession)
}

pub fn notification_body(dataset: &Dataset) -> String {
    format!(
        "New pediatric cancer proteomics/immunopeptidomics dataset found on ProteomeExchange:\n\
         \n\
         Dataset ID: {}\n\
         Title: {}\n\
         Publication Date: {}\n\
         Description: {}\n\
         \n\
         Would you like to download this dataset? Reply with 'Yes' or 'No'.\n",
        dataset.accession,
        dataset.title,
        dataset.publication_date.as_deref().unwrap_or("unknown"),
        dataset.description,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Decline,
    Unclear,
}

/// Accession and decision from a reply, or `None` when the subject names
/// no dataset.
pub fn parse_reply(subject: &str, body: &str) -> Option<(String, Decision)> {
    let accession = SUBJECT_ACCESSION.captures(subject)?.get(1)?.as_str().to_string();
    let decision = if YES.is_match(body) {
        Decision::Approve
    } else if NO.is_match(body) {
        Decision::Decline
    } else {
        Decision::Unclear
    };
    Some((accession, decision))
}

/// Write `<download_dir>/<id>/download_info.txt` for an approved dataset.
/// Returns `None` when the dataset has no download link.
pub fn record_download(dataset: &Dataset, download_dir: &Path, now: NaiveDateTime) -> Result<Option<PathBuf>> {
    let Some(link) = dataset.links.first() else {
        log::error!("No FTP link available for dataset {}", dataset.accession);
        return Ok(None);
    };

    let dataset_dir = download_dir.join(&dataset.accession);
    fs::create_dir_all(&dataset_dir)?;
    log::info!("Downloading dataset {} to {}", dataset.accession, dataset_dir.display());

    let info = dataset_dir.join("download_info.txt");
    fs::write(
        &info,
        format!(
            "Dataset ID: {}\nDownload URL: {link}\nDownload time: {}\n",
            dataset.accession,
            now.format("%Y-%m-%dT%H:%M:%S%.6f")
        ),
    )?;
    Ok(Some(info))
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub search_terms: Vec<String>,
    pub time_window_hours: i64,
    pub check_interval: Duration,
    pub download_dir: PathBuf,
}

/// Counts from one check cycle.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub found: usize,
    pub notified: usize,
    pub approved: usize,
    pub declined: usize,
}

/// Called for each approved dataset after its download record is written.
pub type ApprovedHook = Box<dyn FnMut(&Dataset)>;

pub struct Monitor<S, A> {
    source: S,
    channel: A,
    options: MonitorOptions,
    /// Accessions already notified during this process.
    seen: HashSet<String>,
    notified: HashMap<String, Dataset>,
    on_approved: Option<ApprovedHook>,
}

impl<S: DatasetSource, A: ApprovalChannel> Monitor<S, A> {
    pub fn new(source: S, channel: A, options: MonitorOptions) -> Result<Self> {
        fs::create_dir_all(&options.download_dir)?;
        Ok(Self {
            source,
            channel,
            options,
            seen: HashSet::new(),
            notified: HashMap::new(),
            on_approved: None,
        })
    }

    pub fn on_approved(mut self, hook: ApprovedHook) -> Self {
        self.on_approved = Some(hook);
        self
    }

    /// Discover, notify, then handle replies.
    pub fn check_cycle(&mut self, now: NaiveDateTime) -> CycleReport {
        log::info!("Checking for new pediatric cancer datasets...");
        let mut report = CycleReport::default();

        let datasets = collect_datasets(&self.source, &self.options.search_terms);
        log::info!("Found {} total datasets", datasets.len());

        let fresh: Vec<Dataset> = datasets
            .into_iter()
            .filter(|d| {
                !self.seen.contains(&d.accession)
                    && is_recent(d, self.options.time_window_hours, now)
                    && is_pediatric_cancer(d)
            })
            .collect();
        report.found = fresh.len();
        log::info!("Found {} new pediatric cancer datasets", fresh.len());

        for dataset in fresh {
            self.seen.insert(dataset.accession.clone());
            match self
                .channel
                .notify(&notification_subject(&dataset), &notification_body(&dataset))
            {
                Ok(()) => {
                    log::info!("Email notification sent for dataset {}", dataset.accession);
                    report.notified += 1;
                }
                Err(e) => log::error!("Failed to send email: {e}"),
            }
            self.notified.insert(dataset.accession.clone(), dataset);
        }

        if let Err(e) = self.process_replies(now, &mut report) {
            log::error!("Error checking email responses: {e}");
        }
        self.channel.close();
        report
    }

    fn process_replies(&mut self, now: NaiveDateTime, report: &mut CycleReport) -> Result<()> {
        let replies = self.channel.fetch_replies(&format!("Re: {SUBJECT_PREFIX}"))?;
        for reply in replies {
            let Some((accession, decision)) = parse_reply(&reply.subject, &reply.body) else {
                log::warn!("Could not extract dataset ID from subject: {}", reply.subject);
                continue;
            };

            match decision {
                Decision::Approve => {
                    log::info!("User approved download of dataset {accession}");
                    report.approved += 1;
                    self.download_approved(&accession, now);
                }
                Decision::Decline => {
                    log::info!("User declined download of dataset {accession}");
                    report.declined += 1;
                }
                Decision::Unclear => log::info!("Unclear reply for dataset {accession}"),
            }

            self.channel.mark_seen(&reply)?;
        }
        Ok(())
    }

    fn download_approved(&mut self, accession: &str, now: NaiveDateTime) {
        let dataset = match self.notified.get(accession) {
            Some(dataset) => Some(dataset.clone()),
            None => collect_datasets(&self.source, &self.options.search_terms)
                .into_iter()
                .find(|d| d.accession == accession),
        };
        let Some(dataset) = dataset else {
            log::warn!("Could not find dataset {accession} for download");
            return;
        };

        match record_download(&dataset, &self.options.download_dir, now) {
            Ok(Some(_)) => {
                if let Some(hook) = self.on_approved.as_mut() {
                    hook(&dataset);
                }
            }
            Ok(None) => {}
            Err(e) => log::error!("Error downloading dataset {accession}: {e}"),
        }
    }

    /// One cycle now, then one per interval, forever.
    pub fn run(&mut self) -> ! {
        log::info!(
            "Setting up monitoring every {} hours",
            self.options.check_interval.as_secs() / 3600
        );
        loop {
            self.check_cycle(Local::now().naive_local());
            thread::sleep(self.options.check_interval);
        }
    }
}
