use std::{
    collections::VecDeque,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use reqwest::Url;
use tracing::{debug, info};

use super::{
    client::{ClientError, KdpClient},
    DatasetFile, DatasetRef, FileListing, FileUrlResponse, ListQuery,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The file was already on disk and `overwrite` was not set
    Skipped(PathBuf),
    Downloaded { path: PathBuf, bytes: u64 },
}

impl KdpClient {
    /// Fetches a single page of the dataset's file listing.
    pub fn list_files(
        &self,
        dataset: &DatasetRef,
        query: &ListQuery,
        page_token: Option<&str>,
    ) -> Result<FileListing, ClientError> {
        let url = self.dataset_url(dataset, &["files"])?;
        self.get_json(url, &query.to_params(page_token))
    }

    /// Iterates over every file matching `query`, requesting pages as they are needed.
    pub fn files(&self, dataset: &DatasetRef, query: ListQuery) -> FileIterator {
        FileIterator::new(self.clone(), dataset.clone(), query)
    }

    /// Resolves the short-lived, pre-signed URL a file can be downloaded from.
    pub fn get_file_url(&self, dataset: &DatasetRef, filename: &str) -> Result<Url, ClientError> {
        let url = self.dataset_url(dataset, &["files", filename, "url"])?;
        let response: FileUrlResponse = self.get_json(url, &[])?;
        let raw = response.temporary_download_url.ok_or_else(|| {
            ClientError::InvalidResponse(format!("no temporaryDownloadUrl for {filename}"))
        })?;
        Url::parse(&raw).map_err(|e| {
            ClientError::InvalidUrl(format!("temporaryDownloadUrl for {filename}: {e}"))
        })
    }

    /// Downloads `filename` into `dir`. The body is written to a `.part` file first and only
    /// moved into place once complete, so an interrupted run never leaves a file behind that a
    /// later run would skip.
    pub fn download_file(
        &self,
        dataset: &DatasetRef,
        filename: &str,
        dir: &Path,
        overwrite: bool,
    ) -> Result<DownloadOutcome, ClientError> {
        validate_filename(filename)?;
        let target = dir.join(filename);
        if target.exists() && !overwrite {
            info!("File {} already exists, skipping download.", target.display());
            return Ok(DownloadOutcome::Skipped(target));
        }

        fs::create_dir_all(dir)?;

        info!("Downloading file: {filename}");
        let download_url = self.get_file_url(dataset, filename)?;
        debug!("Temporary download url: {download_url}");

        let partial = dir.join(format!("{filename}.part"));
        let bytes = match self.stream_to(download_url, &partial) {
            Ok(bytes) => bytes,
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&partial) {
                    debug!("Could not remove {}: {cleanup}", partial.display());
                }
                return Err(e);
            }
        };
        fs::rename(&partial, &target)?;

        info!(
            "Successfully downloaded dataset file to {} ({bytes} bytes)",
            target.display()
        );
        Ok(DownloadOutcome::Downloaded {
            path: target,
            bytes,
        })
    }

    fn stream_to(&self, url: Url, path: &Path) -> Result<u64, ClientError> {
        let mut response = self.fetch_unauthenticated(url)?;
        let mut file = File::create(path)?;
        let bytes = response.copy_to(&mut file)?;
        file.flush()?;
        file.sync_all()?;
        Ok(bytes)
    }
}

fn validate_filename(filename: &str) -> Result<(), ClientError> {
    let path = Path::new(filename);
    let is_plain = path.file_name().map(|name| name == path.as_os_str()) == Some(true);
    if filename.is_empty() || !is_plain || filename.contains(['/', '\\']) {
        return Err(ClientError::InvalidResponse(format!(
            "refusing to download to unsafe file name {filename:?}"
        )));
    }
    Ok(())
}

/// Pages through a file listing, holding at most one page in memory.
pub struct FileIterator {
    client: KdpClient,
    dataset: DatasetRef,
    query: ListQuery,
    buffer: VecDeque<DatasetFile>,
    next_page: Option<String>,
    exhausted: bool,
    yielded: usize,
}

impl FileIterator {
    pub fn new(client: KdpClient, dataset: DatasetRef, query: ListQuery) -> Self {
        Self {
            client,
            dataset,
            query,
            buffer: VecDeque::new(),
            next_page: None,
            exhausted: false,
            yielded: 0,
        }
    }

    fn fetch_next_page(&mut self) -> Result<(), ClientError> {
        let listing =
            self.client
                .list_files(&self.dataset, &self.query, self.next_page.as_deref())?;
        debug!(
            "Fetched {} files from {}, truncated: {}",
            listing.files.len(),
            self.dataset,
            listing.is_truncated
        );

        self.next_page = listing.next_page().map(str::to_string);
        // A page token on an empty page would loop forever
        if self.next_page.is_none() || listing.files.is_empty() {
            self.exhausted = true;
        }
        self.buffer.extend(listing.files);
        Ok(())
    }
}

impl Iterator for FileIterator {
    type Item = Result<DatasetFile, ClientError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(limit) = self.query.limit {
            if self.yielded >= limit {
                return None;
            }
        }

        if self.buffer.is_empty() {
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.fetch_next_page() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }

        let file = self.buffer.pop_front()?;
        self.yielded += 1;
        Some(Ok(file))
    }
}
