use std::time::Duration;

use crate::utils::backoff::BackoffPolicy;

pub const DEFAULT_BASE_URL: &str = "https://api.dataplatform.knmi.nl/open-data/v1/";
pub const DEFAULT_DATASET: &str = "nl_rdr_data_rtcor_5m_tar";
pub const DEFAULT_DATASET_VERSION: &str = "1.0";

/// How the KDP client talks to the Open Data API.
#[derive(Debug, Clone)]
pub struct KdpConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: BackoffPolicy,
    // Registered API keys get 1000 requests per hour
    pub rate_limit: usize,
    pub rate_window: Duration,
    pub min_interval: Duration,
}

impl Default for KdpConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 5,
            backoff: BackoffPolicy::default(),
            rate_limit: 1000,
            rate_window: Duration::from_secs(60 * 60),
            min_interval: Duration::from_millis(500),
        }
    }
}

impl KdpConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

