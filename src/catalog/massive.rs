use reqwest::blocking::Client;
use serde_json::Value;

use super::{Dataset, DatasetSource, get_json, http_client};
use crate::error::{LakeError, Result};

/// Client for the MassIVE PROXI `datasets` endpoint.
pub struct MassiveClient {
    client: Client,
    base_url: String,
    page_size: usize,
}

impl MassiveClient {
    pub fn new(base_url: impl Into<String>, page_size: usize) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.into(),
            page_size,
        })
    }
}

impl DatasetSource for MassiveClient {
    fn search(&self, term: &str) -> Result<Vec<Dataset>> {
        let page_size = self.page_size.to_string();
        let url = reqwest::Url::parse_with_params(
            &self.base_url,
            &[
                ("resultType", "compact"),
                ("pageSize", page_size.as_str()),
                ("search", term),
            ],
        )
        .map_err(|e| LakeError::InvalidArgument(format!("{}: {e}", self.base_url)))?;
        let body: Value = get_json(&self.client, url.as_str())?;
        Ok(parse_datasets(&body))
    }
}

/// PROXI records carry the accession either as a plain string or inside the
/// `identifiers` CV list; both shapes are accepted.
fn parse_datasets(body: &Value) -> Vec<Dataset> {
    let Some(records) = body.as_array() else {
        log::warn!("MassIVE answered with a non-list document");
        return Vec::new();
    };

    records
        .iter()
        .filter_map(|record| {
            let accession = record_accession(record)?;
            Some(Dataset {
                accession,
                title: text_field(record, "title"),
                publication_date: None,
                description: text_field(record, "summary"),
                links: Vec::new(),
            })
        })
        .collect()
}

fn record_accession(record: &Value) -> Option<String> {
    match record.get("accession") {
        Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
        Some(Value::Object(term)) => {
            if let Some(Value::String(v)) = term.get("value") {
                return Some(v.clone());
            }
        }
        _ => {}
    }
    record
        .get("identifiers")?
        .as_array()?
        .iter()
        .filter_map(|id| id.get("value")?.as_str())
        .find(|v| v.starts_with("MSV") || v.starts_with("PXD"))
        .map(str::to_string)
}

fn text_field(record: &Value, key: &str) -> String {
    record
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_accession_shapes_are_read() {
        let body: Value = serde_json::from_str(
            r#"[
                {"accession": "MSV000090001", "title": "Medulloblastoma"},
                {"identifiers": [
                    {"accession": "MS:1002872", "value": "PXD040000"},
                    {"accession": "MS:1002487", "value": "MSV000090002"}
                 ], "title": "Ewing sarcoma", "summary": "HLA ligands"},
                {"title": "no accession"}
            ]"#,
        )
        .unwrap();

        let datasets = parse_datasets(&body);
        assert_eq!(datasets.len(), 2);
        assert_eq!(datasets[0].accession, "MSV000090001");
        assert_eq!(datasets[1].accession, "PXD040000");
        assert_eq!(datasets[1].description, "HLA ligands");
    }
}
