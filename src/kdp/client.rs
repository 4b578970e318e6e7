use std::{
    fmt::Display,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use reqwest::{
    blocking::{Client, RequestBuilder, Response},
    header::RETRY_AFTER,
    Method, StatusCode, Url,
};
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    config::KdpConfig,
    utils::{throttler::Throttler, token::Token},
};

use super::DatasetRef;

const USER_AGENT: &str = concat!("weathergen/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum ClientError {
    RequestError(reqwest::Error),
    // All non-success status codes, after retries. The url has its query removed, since
    // pre-signed download links carry their signature there
    ApiError(u16, Box<Url>, String),
    InvalidUrl(String),
    InvalidResponse(String),
    Io(std::io::Error),
}

impl Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::RequestError(err) => write!(f, "Request error: {err}"),
            ClientError::InvalidUrl(msg) => write!(f, "Failed to build URL: {msg}"),
            ClientError::InvalidResponse(msg) => write!(f, "Unexpected response: {msg}"),
            ClientError::Io(err) => write!(f, "I/O error: {err}"),
            ClientError::ApiError(status, url, body) => {
                // Parsed on display, so bodies that are not JSON still show up
                match serde_json::from_str::<ApiErrorResponse>(body) {
                    Ok(api_error) if api_error.has_content() => {
                        write!(f, "API error: status='{status}' {api_error}")
                    }
                    _ => write!(
                        f,
                        "API error: status='{status}' url='{url}' message='{body}'",
                    ),
                }
            }
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        ClientError::RequestError(error.without_url())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(error: std::io::Error) -> Self {
        ClientError::Io(error)
    }
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::ApiError(status, _, _) => Some(*status),
            _ => None,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct ApiErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ApiErrorResponse {
    fn has_content(&self) -> bool {
        self.error.is_some() || self.message.is_some()
    }
}

impl Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(error) = &self.error {
            write!(f, "error='{error}'")?;
            if self.message.is_some() {
                write!(f, " ")?;
            }
        }
        if let Some(message) = &self.message {
            write!(f, "message='{message}'")?;
        }
        Ok(())
    }
}

/// Blocking client for the Open Data API. Clones share one rate limit budget.
#[derive(Clone)]
pub struct KdpClient {
    config: KdpConfig,
    token: Token,
    client: Client,
    throttler: Arc<Mutex<Throttler>>,
}

impl KdpClient {
    pub fn new(config: KdpConfig, token: Token) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()?;
        let throttler = Arc::new(Mutex::new(Throttler::new(
            config.rate_limit,
            config.rate_window,
            config.min_interval,
        )));
        Ok(Self {
            config,
            token,
            client,
            throttler,
        })
    }

    /// `{base}/datasets/{name}/versions/{version}/{segments..}`, with every segment escaped.
    pub fn dataset_url(&self, dataset: &DatasetRef, segments: &[&str]) -> Result<Url, ClientError> {
        let base = &self.config.base_url;
        let mut url =
            Url::parse(base).map_err(|e| ClientError::InvalidUrl(format!("{e} {base}")))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(format!("cannot be a base: {base}")))?
            .pop_if_empty()
            .extend([
                "datasets",
                dataset.name.as_str(),
                "versions",
                dataset.version.as_str(),
            ])
            .extend(segments);
        Ok(url)
    }

    pub fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        params: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let response = self.send_request(Method::GET, url, |req| req.query(params))?;
        Ok(response.json()?)
    }

    /// Sends an authenticated API request, retrying transient failures.
    pub fn send_request<F: Fn(RequestBuilder) -> RequestBuilder>(
        &self,
        method: Method,
        url: Url,
        builder: F,
    ) -> Result<Response, ClientError> {
        self.execute(|| {
            self.throttle();
            builder(self.create_request(method.clone(), url.clone()))
        })
    }

    /// Fetches a URL outside the API, e.g. a pre-signed download link. These must not carry our
    /// API key, and do not count against the API quota.
    pub fn fetch_unauthenticated(&self, url: Url) -> Result<Response, ClientError> {
        self.execute(|| self.client.get(url.clone()))
    }

    fn execute<F: Fn() -> RequestBuilder>(&self, request: F) -> Result<Response, ClientError> {
        let mut attempt = 0;
        loop {
            let requested_delay = match request().send() {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    if !is_retryable(status) || attempt >= self.config.max_retries {
                        let url = Box::new(without_query(response.url()));
                        let body = response.text().unwrap_or_default();
                        return Err(ClientError::ApiError(status.as_u16(), url, body));
                    }
                    warn!(
                        "Request to {} failed with status {status}, attempt {}/{}",
                        response.url().path(),
                        attempt + 1,
                        self.config.max_retries + 1
                    );
                    retry_after(&response)
                }
                Err(err) => {
                    let err = err.without_url();
                    if err.is_builder() || attempt >= self.config.max_retries {
                        return Err(err.into());
                    }
                    warn!(
                        "Request failed: {err}, attempt {}/{}",
                        attempt + 1,
                        self.config.max_retries + 1
                    );
                    None
                }
            };

            let delay = requested_delay.unwrap_or_else(|| self.config.backoff.next_delay(attempt));
            debug!("Retrying in {delay:?}");
            std::thread::sleep(delay);
            attempt += 1;
        }
    }

    fn throttle(&self) {
        self.throttler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .throttle();
    }

    fn create_request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!("building request for {method} {url}");
        self.client
            .request(method, url)
            .header("Authorization", self.token.expose())
    }
}

fn without_query(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_query(None);
    url.set_fragment(None);
    url
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
