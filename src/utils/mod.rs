use std::path::PathBuf;

pub mod backoff;
pub mod throttler;
pub mod token;

/// The directory radar archives and images are stored in when nothing else is configured.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("weathergenerator")
        .join("data")
}
