use anyhow::{bail, Result};
use tracing::info;

use super::DataDirArgs;
use crate::archive::extract_all;

#[derive(clap::Args, Clone)]
pub struct Args {
    #[command(flatten)]
    pub data_dir: DataDirArgs,
}

pub fn extract(args: &Args) -> Result<()> {
    let dir = args.data_dir.resolve();
    if !dir.is_dir() {
        bail!("Data directory {} does not exist", dir.display());
    }

    let report = extract_all(&dir)?;
    info!(
        "Extracted {} files, skipped {} already present, rejected {}",
        report.extracted, report.skipped, report.rejected
    );
    Ok(())
}
