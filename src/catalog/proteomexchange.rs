use reqwest::blocking::Client;
use serde::Deserialize;

use super::{Dataset, DatasetSource, http_client};
use crate::error::{LakeError, Result};

/// Client for ProteomeCentral's `GetDataset` listing.
pub struct ProteomeCentralClient {
    client: Client,
    endpoint: String,
    max_hits: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListingResponse {
    datasets: Vec<ListingRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListingRecord {
    id: String,
    title: String,
    #[serde(rename = "publicationDate")]
    publication_date: Option<String>,
    description: String,
    ftp_link: Option<String>,
}

impl From<ListingRecord> for Dataset {
    fn from(r: ListingRecord) -> Self {
        Dataset {
            accession: r.id,
            title: r.title,
            publication_date: r.publication_date.filter(|d| !d.is_empty()),
            description: r.description,
            links: r.ftp_link.into_iter().filter(|l| !l.is_empty()).collect(),
        }
    }
}

impl ProteomeCentralClient {
    pub fn new(endpoint: impl Into<String>, max_hits: usize) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            endpoint: endpoint.into(),
            max_hits,
        })
    }
}

impl DatasetSource for ProteomeCentralClient {
    fn search(&self, term: &str) -> Result<Vec<Dataset>> {
        let max_hits = self.max_hits.to_string();
        let params = [
            ("action", "list"),
            ("test", "no"),
            ("keywords", term),
            ("species", ""),
            ("instrument", ""),
            ("publicationdate", ""),
            ("maxhits", max_hits.as_str()),
            ("format", "json"),
        ];
        let response = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| LakeError::http(&self.endpoint, e))?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.starts_with("application/json") {
            log::warn!("Unexpected content type: {content_type}");
            return Ok(Vec::new());
        }

        let body = response
            .text()
            .map_err(|e| LakeError::http(&self.endpoint, e))?;
        parse_listing(&body)
    }
}

fn parse_listing(body: &str) -> Result<Vec<Dataset>> {
    let listing: ListingResponse = serde_json::from_str(body)?;
    Ok(listing.datasets.into_iter().map(Dataset::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_maps_to_datasets() {
        let datasets = parse_listing(
            r#"{"datasets": [
                {"id": "PXD050001", "title": "Pediatric glioma proteome",
                 "publicationDate": "2025-01-28", "description": "HLA peptides",
                 "ftp_link": "ftp://ftp.pride.ebi.ac.uk/pride/data/archive/2025/01/PXD050001"},
                {"id": "PXD050002", "title": "No date", "publicationDate": ""}
            ]}"#,
        )
        .unwrap();

        assert_eq!(datasets.len(), 2);
        assert_eq!(datasets[0].accession, "PXD050001");
        assert_eq!(datasets[0].publication_date.as_deref(), Some("2025-01-28"));
        assert_eq!(datasets[0].links.len(), 1);
        assert_eq!(datasets[1].publication_date, None);
        assert!(datasets[1].links.is_empty());
    }

    #[test]
    fn missing_dataset_list_is_empty() {
        assert!(parse_listing("{}").unwrap().is_empty());
    }
}
