use anyhow::{Context, Result};
use tracing::info;

use super::{DataDirArgs, DatasetArgs, FilterArgs};
use crate::{
    archive::extract_all,
    kdp::{DownloadOutcome, KdpClient},
};

#[derive(clap::Args, Clone)]
pub struct Args {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    #[command(flatten)]
    pub filters: FilterArgs,

    #[command(flatten)]
    pub data_dir: DataDirArgs,

    /// Download files again even if they are already present
    #[arg(long, default_value = "false")]
    pub overwrite: bool,

    /// Leave downloaded tar archives packed
    #[arg(long, default_value = "false")]
    pub no_extract: bool,
}

pub fn download(client: &KdpClient, args: &Args) -> Result<()> {
    let dataset = args.dataset.dataset();
    let dir = args.data_dir.resolve();
    info!("Downloading {dataset} into {}", dir.display());

    let mut downloaded = 0;
    let mut skipped = 0;
    for file in client.files(&dataset, args.filters.query()) {
        let file = file.with_context(|| format!("While listing files of {dataset}"))?;
        let outcome = client
            .download_file(&dataset, &file.filename, &dir, args.overwrite)
            .with_context(|| format!("While downloading {}", file.filename))?;
        match outcome {
            DownloadOutcome::Skipped(_) => skipped += 1,
            DownloadOutcome::Downloaded { .. } => downloaded += 1,
        }
    }
    info!("Downloaded {downloaded} files, {skipped} were already present");

    if !args.no_extract && dir.is_dir() {
        let report = extract_all(&dir)?;
        info!(
            "Extracted {} files, skipped {} already present",
            report.extracted, report.skipped
        );
    }

    Ok(())
}
