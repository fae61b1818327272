use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{ObjectStore, TagSet};
use crate::catalog::{CvTerm, ProjectCatalog, ProjectDetails};
use crate::error::Result;

const MAX_TAG_VALUE_LEN: usize = 255;

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s,.:-]").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Coerce a value into the character set and length S3 accepts for tags.
pub fn sanitize_tag_value(value: &str) -> String {
    if value.is_empty() {
        return "unknown".to_string();
    }
    let printable: String = value.chars().filter(|c| (' '..='~').contains(c)).collect();
    let replaced = DISALLOWED.replace_all(&printable, " ");
    let collapsed = WHITESPACE.replace_all(&replaced, " ");
    // Only ASCII is left, so byte truncation stays on a char boundary.
    let mut cleaned = collapsed.trim().to_string();
    cleaned.truncate(MAX_TAG_VALUE_LEN);
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

fn join_names(terms: &[CvTerm]) -> String {
    terms
        .iter()
        .map(|t| t.name.as_str())
        .filter(|n| !n.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn highlights_text(highlights: &Value) -> String {
    match highlights {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|h| match h {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

/// Tags for every object of a PRIDE dataset, most important first.
pub fn extract_tags(details: &ProjectDetails) -> TagSet {
    let mut tags = TagSet::new();
    let mut put = |key: &str, value: &str| {
        if !value.is_empty() {
            tags.insert(key, sanitize_tag_value(value));
        }
    };

    put("accession", &details.accession);
    put("title", &details.title);
    put("submissionType", &details.submission_type);
    put("publicationDate", &details.publication_date);

    let submitters = details
        .submitters
        .iter()
        .map(|s| format!("{} {}", s.first_name, s.last_name).trim().to_string())
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    put("submitters", &submitters);
    put("affiliations", &details.affiliations.join(", "));

    put("instruments", &join_names(&details.instruments));
    put("softwares", &join_names(&details.softwares));
    put("organisms", &join_names(&details.organisms));
    put("organismsPart", &join_names(&details.organisms_part));
    put("diseases", &join_names(&details.diseases));

    let references = details
        .references
        .iter()
        .filter_map(|r| match (&r.doi, r.pubmed_id) {
            (Some(doi), _) if !doi.is_empty() => Some(format!("DOI:{doi}")),
            (_, Some(id)) if id != 0 => Some(format!("PMID:{id}")),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(", ");
    put("references", &references);
    put("highlights", &highlights_text(&details.highlights));

    tags
}

/// Counts from one tagging run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TaggingReport {
    pub datasets: usize,
    pub tagged: usize,
    pub failed: usize,
}

/// Tag every object in each `<prefix><PXD…>/` folder with the metadata of
/// its PRIDE project.
pub fn tag_pride_datasets(
    store: &dyn ObjectStore,
    catalog: &dyn ProjectCatalog,
    prefix: &str,
) -> Result<TaggingReport> {
    let mut report = TaggingReport::default();

    for folder in store.list_prefixes(prefix, "/")? {
        let accession = folder.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
        if !accession.starts_with("PXD") {
            log::info!("Folder {folder} doesn't appear to be a PRIDE dataset, skipping");
            continue;
        }

        log::info!("Processing dataset {accession}");
        let details = match catalog.project_details(accession) {
            Ok(details) => details,
            Err(e) => {
                log::error!("No metadata found for {accession}: {e}");
                continue;
            }
        };
        report.datasets += 1;

        let tags = extract_tags(&details).limited();
        for (key, value) in tags.iter() {
            log::debug!("  {key}: {value}");
        }

        for object in store.list_objects(&folder)? {
            match store.put_object_tags(&object.key, &tags) {
                Ok(()) => {
                    log::info!("Successfully tagged {}", object.key);
                    report.tagged += 1;
                }
                Err(e) => {
                    log::error!("Error tagging {}: {e}", object.key);
                    report.failed += 1;
                }
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::catalog::{Contact, DatasetFile, Reference};
    use crate::error::LakeError;
    use crate::lake::memory::MemoryStore;

    /// Catalog answering from fixed project documents and file listings.
    #[derive(Default)]
    pub(crate) struct StubCatalog {
        pub projects: Vec<ProjectDetails>,
        pub files: Vec<(String, Vec<DatasetFile>)>,
    }

    impl StubCatalog {
        pub(crate) fn with_projects(projects: Vec<ProjectDetails>) -> Self {
            Self {
                projects,
                ..Self::default()
            }
        }
    }

    fn not_found(accession: &str) -> LakeError {
        LakeError::Status {
            url: accession.to_string(),
            status: 404,
        }
    }

    impl ProjectCatalog for StubCatalog {
        fn project_details(&self, accession: &str) -> Result<ProjectDetails> {
            self.projects
                .iter()
                .find(|d| d.accession == accession)
                .cloned()
                .ok_or_else(|| not_found(accession))
        }

        fn project_files(&self, accession: &str) -> Result<Vec<DatasetFile>> {
            self.files
                .iter()
                .find(|(acc, _)| acc == accession)
                .map(|(_, files)| files.clone())
                .ok_or_else(|| not_found(accession))
        }
    }

    pub(crate) fn glioma() -> ProjectDetails {
        ProjectDetails {
            accession: "PXD000001".into(),
            title: "Pediatric glioma / HLA ligandome".into(),
            submission_type: "COMPLETE".into(),
            publication_date: "2025-01-28".into(),
            submitters: vec![Contact {
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
            }],
            instruments: vec![
                CvTerm { name: "Orbitrap Exploris 480".into() },
                CvTerm { name: "timsTOF Pro".into() },
            ],
            references: vec![
                Reference { doi: None, pubmed_id: Some(0) },
                Reference { doi: None, pubmed_id: Some(38000000) },
            ],
            highlights: Value::String("first map".into()),
            ..ProjectDetails::default()
        }
    }

    #[test]
    fn sanitize_follows_s3_rules() {
        assert_eq!(sanitize_tag_value(""), "unknown");
        assert_eq!(sanitize_tag_value("  a/b\t(c)  "), "a b c");
        assert_eq!(sanitize_tag_value("Homo sapiens (human)"), "Homo sapiens human");
        assert_eq!(sanitize_tag_value("é€"), "unknown");
        assert_eq!(sanitize_tag_value(&"x".repeat(300)).len(), 255);
        assert_eq!(sanitize_tag_value("2025-01-28"), "2025-01-28");
    }

    #[test]
    fn tags_come_out_in_priority_order() {
        let tags = extract_tags(&glioma());
        let keys: Vec<_> = tags.iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                "accession",
                "title",
                "submissionType",
                "publicationDate",
                "submitters",
                "instruments",
                "references",
                "highlights"
            ]
        );
        assert_eq!(tags.get("title"), Some("Pediatric glioma HLA ligandome"));
        assert_eq!(tags.get("instruments"), Some("Orbitrap Exploris 480, timsTOF Pro"));
        assert_eq!(tags.get("references"), Some("PMID:38000000"));
    }

    #[test]
    fn only_pride_folders_are_tagged() {
        let store = MemoryStore::with_objects([
            ("data/PXD000001/S1.raw", 10),
            ("data/PXD000001/S2.raw", 20),
            ("data/PXD999999/S1.raw", 5),
            ("data/notes/readme.txt", 1),
        ]);
        let catalog = StubCatalog::with_projects(vec![glioma()]);

        let report = tag_pride_datasets(&store, &catalog, "data/").unwrap();

        assert_eq!(
            report,
            TaggingReport {
                datasets: 1,
                tagged: 2,
                failed: 0
            }
        );
        let tags = store.tags("data/PXD000001/S2.raw").unwrap();
        assert_eq!(tags.get("accession"), Some("PXD000001"));
        assert!(store.tags("data/PXD999999/S1.raw").unwrap().is_empty());
    }

    #[test]
    fn object_failures_are_counted() {
        let mut store = MemoryStore::with_objects([
            ("data/PXD000001/S1.raw", 10),
            ("data/PXD000001/S2.raw", 20),
        ]);
        store.broken.push("data/PXD000001/S1.raw".into());
        let report = tag_pride_datasets(&store, &StubCatalog::with_projects(vec![glioma()]), "data/").unwrap();
        assert_eq!(report.tagged, 1);
        assert_eq!(report.failed, 1);
    }
}
