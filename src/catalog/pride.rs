use std::fmt;
use std::str::FromStr;

use reqwest::Url;
use reqwest::blocking::Client;
use serde::Deserialize;

use super::{DatasetFile, ProjectCatalog, ProjectDetails, get_json, http_client};
use crate::error::{LakeError, Result};

// ---------------------------------------------------------------------------
// Search query
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "ASC"),
            SortDirection::Desc => write!(f, "DESC"),
        }
    }
}

impl FromStr for SortDirection {
    type Err = LakeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ASC" => Ok(SortDirection::Asc),
            "DESC" => Ok(SortDirection::Desc),
            other => Err(LakeError::InvalidArgument(format!(
                "sort direction must be ASC or DESC, got '{other}'"
            ))),
        }
    }
}

/// Parameters of `GET /search/projects`.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub keyword: String,
    pub page_size: usize,
    pub page: usize,
    /// `field1==value1,field2==value2`
    pub filter: Option<String>,
    pub sort_direction: SortDirection,
    pub sort_fields: String,
}

impl SearchQuery {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            page_size: 100,
            page: 0,
            filter: None,
            sort_direction: SortDirection::Desc,
            sort_fields: "submissionDate".to_string(),
        }
    }

    pub fn url(&self, base_url: &str) -> Result<Url> {
        let endpoint = format!("{}/search/projects", base_url.trim_end_matches('/'));
        let mut params = vec![
            ("keyword", self.keyword.clone()),
            ("pageSize", self.page_size.to_string()),
            ("page", self.page.to_string()),
            ("sortDirection", self.sort_direction.to_string()),
            ("sortFields", self.sort_fields.clone()),
        ];
        if let Some(filter) = &self.filter {
            params.push(("filter", filter.clone()));
        }
        Url::parse_with_params(&endpoint, &params)
            .map_err(|e| LakeError::InvalidArgument(format!("{endpoint}: {e}")))
    }
}

/// One hit of a project search.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectSummary {
    pub accession: Option<String>,
    pub title: String,
    pub publication_date: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Blocking client for the PRIDE Archive v3 REST API.
pub struct PrideClient {
    client: Client,
    base_url: String,
}

impl PrideClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// One page of search results.
    pub fn search_projects(&self, query: &SearchQuery) -> Result<Vec<ProjectSummary>> {
        let url = query.url(&self.base_url)?;
        log::info!("Searching PRIDE with URL: {url}");
        let results: Vec<ProjectSummary> = get_json(&self.client, url.as_str())?;
        log::info!("Found {} datasets matching the search criteria", results.len());
        Ok(results)
    }

    /// Walk result pages until one comes back short or `max` hits are
    /// collected. `max == 0` means no limit.
    pub fn search_paginated(&self, query: &SearchQuery, max: usize) -> Result<Vec<ProjectSummary>> {
        walk_pages(query, max, |page| self.search_projects(page))
    }
}

/// Page walker behind [`PrideClient::search_paginated`]. A failure on the
/// first page is returned; a later one ends the walk with what was collected.
fn walk_pages<F>(query: &SearchQuery, max: usize, mut fetch_page: F) -> Result<Vec<ProjectSummary>>
where
    F: FnMut(&SearchQuery) -> Result<Vec<ProjectSummary>>,
{
    let limit = if max == 0 { usize::MAX } else { max };
    let mut page_query = query.clone();
    let mut collected = Vec::new();
    while collected.len() < limit {
        let page = match fetch_page(&page_query) {
            Ok(page) => page,
            Err(e) if !collected.is_empty() => {
                log::warn!(
                    "Stopping at page {} with {} datasets: {e}",
                    page_query.page,
                    collected.len()
                );
                break;
            }
            Err(e) => return Err(e),
        };
        let short = page.is_empty() || page.len() < page_query.page_size;
        collected.extend(page);
        if short || page_query.page_size == 0 {
            break;
        }
        page_query.page += 1;
    }
    if collected.len() > limit {
        log::info!("Limiting to {limit} of {} datasets", collected.len());
        collected.truncate(limit);
    }
    Ok(collected)
}

impl ProjectCatalog for PrideClient {
    fn project_details(&self, accession: &str) -> Result<ProjectDetails> {
        let url = format!("{}/projects/{accession}", self.base_url);
        get_json(&self.client, &url)
    }

    fn project_files(&self, accession: &str) -> Result<Vec<DatasetFile>> {
        let url = format!("{}/projects/{accession}/files", self.base_url);
        get_json(&self.client, &url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_carries_every_parameter() {
        let mut query = SearchQuery::new("pediatric cancer");
        query.page = 2;
        query.filter = Some("organisms==Homo sapiens (human)".to_string());

        let url = query.url("https://www.ebi.ac.uk/pride/ws/archive/v3/").unwrap();
        assert_eq!(url.path(), "/pride/ws/archive/v3/search/projects");

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(pairs[0], ("keyword".into(), "pediatric cancer".into()));
        assert_eq!(pairs[1], ("pageSize".into(), "100".into()));
        assert_eq!(pairs[2], ("page".into(), "2".into()));
        assert_eq!(pairs[3], ("sortDirection".into(), "DESC".into()));
        assert_eq!(pairs[4], ("sortFields".into(), "submissionDate".into()));
        assert_eq!(pairs[5].1, "organisms==Homo sapiens (human)");
    }

    #[test]
    fn sort_direction_parses_case_insensitively() {
        assert_eq!("asc".parse::<SortDirection>().unwrap(), SortDirection::Asc);
        assert_eq!("DESC".parse::<SortDirection>().unwrap(), SortDirection::Desc);
        assert!("up".parse::<SortDirection>().is_err());
    }

    fn hits(page: usize, n: usize) -> Vec<ProjectSummary> {
        (0..n)
            .map(|i| ProjectSummary {
                accession: Some(format!("PXD{page:03}{i:03}")),
                title: format!("page {page} hit {i}"),
                publication_date: None,
            })
            .collect()
    }

    fn paged_query(page_size: usize) -> SearchQuery {
        let mut query = SearchQuery::new("liver");
        query.page_size = page_size;
        query
    }

    #[test]
    fn pages_advance_until_a_short_page() {
        let mut seen = Vec::new();
        let found = walk_pages(&paged_query(3), 0, |q| {
            seen.push(q.page);
            Ok(hits(q.page, if q.page < 2 { 3 } else { 1 }))
        })
        .unwrap();

        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(found.len(), 7);
        assert_eq!(found[6].accession.as_deref(), Some("PXD002000"));
    }

    #[test]
    fn an_empty_page_ends_the_walk() {
        let mut seen = Vec::new();
        let found = walk_pages(&paged_query(2), 10, |q| {
            seen.push(q.page);
            Ok(if q.page == 0 { hits(0, 2) } else { Vec::new() })
        })
        .unwrap();

        assert_eq!(seen, vec![0, 1]);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn walk_starts_at_the_requested_page_and_stops_at_max() {
        let mut query = paged_query(4);
        query.page = 5;
        let mut seen = Vec::new();
        let found = walk_pages(&query, 6, |q| {
            seen.push(q.page);
            Ok(hits(q.page, 4))
        })
        .unwrap();

        assert_eq!(seen, vec![5, 6]);
        assert_eq!(found.len(), 6);
        assert_eq!(found[5].accession.as_deref(), Some("PXD006001"));
    }

    #[test]
    fn zero_max_means_unlimited() {
        let found = walk_pages(&paged_query(2), 0, |q| Ok(hits(q.page, if q.page < 4 { 2 } else { 0 }))).unwrap();
        assert_eq!(found.len(), 8);
    }

    #[test]
    fn later_page_failure_keeps_collected_hits() {
        let found = walk_pages(&paged_query(2), 0, |q| {
            if q.page == 0 {
                Ok(hits(0, 2))
            } else {
                Err(LakeError::Status { url: "page 1".into(), status: 503 })
            }
        })
        .unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn first_page_failure_is_an_error() {
        let outcome = walk_pages(&paged_query(2), 0, |_| {
            Err(LakeError::Status { url: "page 0".into(), status: 503 })
        });
        assert!(outcome.is_err());
    }
}
