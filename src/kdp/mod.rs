//! Client for the KNMI Data Platform (KDP) Open Data API.

use std::fmt::Display;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub mod client;
pub mod files;

pub use client::{ClientError, KdpClient};
pub use files::{DownloadOutcome, FileIterator};

/// A dataset on the platform is addressed by its name and version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRef {
    pub name: String,
    pub version: String,
}

impl DatasetRef {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl Display for DatasetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OrderBy {
    #[default]
    Filename,
    Created,
    LastModified,
}

impl OrderBy {
    pub fn as_param(&self) -> &'static str {
        match self {
            OrderBy::Filename => "filename",
            OrderBy::Created => "created",
            OrderBy::LastModified => "lastModified",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Sorting {
    #[default]
    Asc,
    Desc,
}

impl Sorting {
    pub fn as_param(&self) -> &'static str {
        match self {
            Sorting::Asc => "asc",
            Sorting::Desc => "desc",
        }
    }
}

/// Filters for a file listing. `begin` and `end` select files by their timestamp and are sent as
/// midnight UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub max_keys: usize,
    pub order_by: OrderBy,
    pub sorting: Sorting,
    pub begin: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Stop after this many files, across pages
    pub limit: Option<usize>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            max_keys: 10,
            order_by: OrderBy::default(),
            sorting: Sorting::default(),
            begin: None,
            end: None,
            limit: None,
        }
    }
}

impl ListQuery {
    pub fn to_params(&self, page_token: Option<&str>) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("maxKeys", self.max_keys.to_string()),
            ("orderBy", self.order_by.as_param().to_string()),
            ("sorting", self.sorting.as_param().to_string()),
        ];
        if let Some(begin) = self.begin {
            params.push(("begin", format_timestamp(begin)));
        }
        if let Some(end) = self.end {
            params.push(("end", format_timestamp(end)));
        }
        if let Some(token) = page_token {
            params.push(("nextPageToken", token.to_string()));
        }
        params
    }
}

/// Midnight UTC on `date`, in the ISO 8601 form the API accepts.
pub fn format_timestamp(date: NaiveDate) -> String {
    date.format("%Y-%m-%dT00:00:00+00:00").to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetFile {
    pub filename: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
}

/// One page of a file listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListing {
    #[serde(default)]
    pub is_truncated: bool,
    #[serde(default)]
    pub result_count: usize,
    #[serde(default)]
    pub files: Vec<DatasetFile>,
    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub start_after_filename: Option<String>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl FileListing {
    /// The token for the following page, if there is one. The API sends an empty token on the
    /// last page.
    pub fn next_page(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileUrlResponse {
    pub temporary_download_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_are_midnight_utc() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        assert_eq!(format_timestamp(date), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn query_params_include_only_set_filters() {
        let query = ListQuery {
            max_keys: 31,
            order_by: OrderBy::Created,
            begin: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..Default::default()
        };

        let params = query.to_params(Some("abc"));

        assert_eq!(
            params,
            vec![
                ("maxKeys", "31".to_string()),
                ("orderBy", "created".to_string()),
                ("sorting", "asc".to_string()),
                ("begin", "2024-01-01T00:00:00+00:00".to_string()),
                ("nextPageToken", "abc".to_string()),
            ]
        );
    }

    #[test]
    fn parses_listing_response() {
        let body = r#"{
            "isTruncated": true,
            "resultCount": 1,
            "files": [
                {
                    "filename": "RAD25_OPER_R___TARPCP__L2__20240101T000000_20240102T000000_0001.tar",
                    "size": 23805440,
                    "created": "2024-01-02T00:31:22+00:00",
                    "lastModified": "2024-01-02T00:31:22+00:00"
                }
            ],
            "maxResults": 1,
            "startAfterFilename": "",
            "nextPageToken": "eyJzdGFydCI6IDF9"
        }"#;

        let listing: FileListing = serde_json::from_str(body).unwrap();

        assert!(listing.is_truncated);
        assert_eq!(listing.files.len(), 1);
        assert_eq!(listing.files[0].size, 23805440);
        assert_eq!(listing.next_page(), Some("eyJzdGFydCI6IDF9"));
    }

    #[test]
    fn empty_page_token_means_last_page() {
        let listing: FileListing =
            serde_json::from_str(r#"{"files": [], "nextPageToken": ""}"#).unwrap();

        assert_eq!(listing.next_page(), None);
    }
}
