use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::catalog::ProjectDetails;
use crate::error::Result;

/// Per-dataset record written as `<accession>_metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    #[serde(rename = "Data_access")]
    pub data_access: String,
    #[serde(rename = "Dataset_ID")]
    pub dataset_id: String,
    #[serde(rename = "Dataset_size_in_Gbs")]
    pub dataset_size_gb: f64,
    #[serde(rename = "Experiment_type")]
    pub experiment_type: String,
    #[serde(rename = "MS_type")]
    pub ms_type: String,
    #[serde(rename = "Enzyme")]
    pub enzyme: String,
    #[serde(rename = "Disease")]
    pub disease: String,
    #[serde(rename = "Disease_subtype")]
    pub disease_subtype: String,
    #[serde(rename = "Sample_type")]
    pub sample_type: String,
    #[serde(rename = "Sample_details")]
    pub sample_details: String,
    #[serde(rename = "Year_of_publication")]
    pub year_of_publication: String,
    #[serde(rename = "DOI")]
    pub doi: String,
    #[serde(rename = "Keywords")]
    pub keywords: String,
}

impl Default for DatasetMetadata {
    fn default() -> Self {
        Self {
            data_access: "Public".into(),
            dataset_id: String::new(),
            dataset_size_gb: 0.0,
            experiment_type: "Proteomics".into(),
            ms_type: "DDA".into(),
            enzyme: "Trypsin".into(),
            disease: "Normal".into(),
            disease_subtype: "Normal".into(),
            sample_type: "Tissue".into(),
            sample_details: String::new(),
            year_of_publication: String::new(),
            doi: String::new(),
            keywords: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Heuristic vocabularies, checked in order; the first hit wins.
// ---------------------------------------------------------------------------

static MS_TYPES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        ("dda", "DDA"),
        ("dia", "DIA"),
        ("wwa", "WWA"),
        ("prm", "PRM"),
        ("srm", "SRM"),
        ("mrm", "MRM"),
    ]
    .into_iter()
    .map(|(word, label)| {
        let re = Regex::new(&format!(r"\b{word}\b")).expect("valid regex");
        (re, label)
    })
    .collect()
});

const ENZYMES: &[(&str, &str)] = &[
    ("chymotrypsin", "Chymotrypsin"),
    ("trypsin", "Trypsin"),
    ("lysc", "LysC"),
    ("no enzyme", "None"),
];

const CANCER_TYPES: &[&str] = &[
    "breast",
    "lung",
    "liver",
    "colon",
    "prostate",
    "ovarian",
    "pancreatic",
    "melanoma",
    "leukemia",
];

const SAMPLE_TYPES: &[(&str, &str)] = &[
    ("tissue", "Tissue"),
    ("cell line", "Cell line"),
    ("primary cell", "Primary cell"),
    ("organoid", "Organoid"),
    ("xenograft", "Xenograft"),
];

const CELL_LINES: &[&str] = &["hela", "mcf7", "mcf-7", "hek293", "hek-293", "hct116", "hct-116"];

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Derive data-lake metadata from a PRIDE project document.
pub fn extract_metadata(details: &ProjectDetails) -> DatasetMetadata {
    let mut meta = DatasetMetadata {
        dataset_id: details.accession.clone(),
        doi: details.doi.clone(),
        year_of_publication: details
            .publication_date
            .split('-')
            .next()
            .unwrap_or_default()
            .to_string(),
        keywords: details.keywords.join(", "),
        ..DatasetMetadata::default()
    };

    let text = format!(
        "{}\n{}",
        details.title.to_lowercase(),
        details.project_description.to_lowercase()
    );
    let mentions = |needle: &str| text.contains(needle);

    if mentions("immunopeptidom") {
        meta.experiment_type = "Immunopeptidomics".into();
    }

    if let Some((_, label)) = MS_TYPES.iter().find(|(re, _)| re.is_match(&text)) {
        meta.ms_type = (*label).into();
    }

    if let Some((_, label)) = ENZYMES.iter().find(|(key, _)| mentions(key)) {
        meta.enzyme = (*label).into();
    }

    if mentions("cancer") || mentions("tumor") {
        meta.disease = "Cancer".into();
        if let Some(kind) = CANCER_TYPES.iter().find(|k| mentions(k)) {
            meta.disease_subtype = format!("{} cancer", capitalize(kind));
        }
    } else if mentions("benign") {
        meta.disease = "Benign".into();
    }

    if let Some((_, label)) = SAMPLE_TYPES.iter().find(|(key, _)| mentions(key)) {
        meta.sample_type = (*label).into();
    }

    if meta.sample_type == "Cell line" {
        if let Some(line) = CELL_LINES.iter().find(|l| mentions(l)) {
            meta.sample_details = line.to_uppercase();
        }
    }

    meta
}

impl DatasetMetadata {
    /// Replace fields named by their JSON key. Unknown keys, and sizes that
    /// are not numbers, are returned untouched.
    pub fn apply_overrides(&mut self, overrides: &BTreeMap<String, String>) -> Vec<String> {
        let mut ignored = Vec::new();
        for (key, value) in overrides {
            let slot = match key.as_str() {
                "Data_access" => &mut self.data_access,
                "Dataset_ID" => &mut self.dataset_id,
                "Experiment_type" => &mut self.experiment_type,
                "MS_type" => &mut self.ms_type,
                "Enzyme" => &mut self.enzyme,
                "Disease" => &mut self.disease,
                "Disease_subtype" => &mut self.disease_subtype,
                "Sample_type" => &mut self.sample_type,
                "Sample_details" => &mut self.sample_details,
                "Year_of_publication" => &mut self.year_of_publication,
                "DOI" => &mut self.doi,
                "Keywords" => &mut self.keywords,
                "Dataset_size_in_Gbs" => {
                    match value.parse() {
                        Ok(size) => self.dataset_size_gb = size,
                        Err(_) => ignored.push(key.clone()),
                    }
                    continue;
                }
                _ => {
                    ignored.push(key.clone());
                    continue;
                }
            };
            *slot = value.clone();
        }
        ignored
    }
}

/// Recursive sum of file sizes under `dir`, in GiB.
pub fn directory_size_gb(dir: &Path) -> Result<f64> {
    fn walk(dir: &Path) -> Result<u64> {
        let mut total = 0;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if meta.is_dir() {
                total += walk(&entry.path())?;
            } else {
                total += meta.len();
            }
        }
        Ok(total)
    }
    Ok(walk(dir)? as f64 / (1024.0 * 1024.0 * 1024.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(title: &str, description: &str) -> ProjectDetails {
        ProjectDetails {
            accession: "PXD000001".into(),
            title: title.into(),
            project_description: description.into(),
            publication_date: "2024-03-15".into(),
            keywords: vec!["HLA".into(), "neuroblastoma".into()],
            ..ProjectDetails::default()
        }
    }

    #[test]
    fn defaults_hold_without_any_hints() {
        let meta = extract_metadata(&details("Proteome", "Nothing specific."));
        assert_eq!(meta.ms_type, "DDA");
        assert_eq!(meta.enzyme, "Trypsin");
        assert_eq!(meta.disease, "Normal");
        assert_eq!(meta.sample_type, "Tissue");
        assert_eq!(meta.year_of_publication, "2024");
        assert_eq!(meta.keywords, "HLA, neuroblastoma");
    }

    #[test]
    fn heuristics_pick_the_first_hit() {
        let meta = extract_metadata(&details(
            "Immunopeptidomics of breast tumor cell line",
            "DIA acquisition of MCF-7 digests using chymotrypsin.",
        ));
        assert_eq!(meta.experiment_type, "Immunopeptidomics");
        assert_eq!(meta.ms_type, "DIA");
        assert_eq!(meta.enzyme, "Chymotrypsin");
        assert_eq!(meta.disease, "Cancer");
        assert_eq!(meta.disease_subtype, "Breast cancer");
        assert_eq!(meta.sample_type, "Cell line");
        assert_eq!(meta.sample_details, "MCF-7");
    }

    #[test]
    fn ms_type_needs_a_whole_word() {
        // "diagnostic" must not read as DIA.
        let meta = extract_metadata(&details("Diagnostic markers", "prm assay"));
        assert_eq!(meta.ms_type, "PRM");
    }

    #[test]
    fn overrides_replace_known_keys_only() {
        let mut meta = DatasetMetadata::default();
        let overrides = BTreeMap::from([
            ("Disease".to_string(), "Cancer".to_string()),
            ("Dataset_size_in_Gbs".to_string(), "abc".to_string()),
            ("Lab".to_string(), "X".to_string()),
        ]);
        let ignored = meta.apply_overrides(&overrides);
        assert_eq!(meta.disease, "Cancer");
        assert_eq!(ignored, vec!["Dataset_size_in_Gbs".to_string(), "Lab".to_string()]);
    }

    #[test]
    fn serialises_with_data_lake_keys() {
        let json = serde_json::to_value(DatasetMetadata::default()).unwrap();
        assert_eq!(json["Data_access"], "Public");
        assert_eq!(json["MS_type"], "DDA");
        assert!(json.get("Dataset_size_in_Gbs").is_some());
    }

    #[test]
    fn directory_size_is_recursive() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a"), vec![0u8; 512]).unwrap();
        fs::write(dir.path().join("sub/b"), vec![0u8; 512]).unwrap();
        let gb = directory_size_gb(dir.path()).unwrap();
        assert!((gb - 1024.0 / 1024f64.powi(3)).abs() < 1e-12);
    }
}
