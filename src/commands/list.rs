use anyhow::{Context, Result};
use tracing::info;

use super::{DatasetArgs, FilterArgs};
use crate::kdp::{DatasetFile, KdpClient};

#[derive(clap::Args, Clone)]
pub struct Args {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    #[command(flatten)]
    pub filters: FilterArgs,
}

pub fn list(client: &KdpClient, args: &Args) -> Result<()> {
    let dataset = args.dataset.dataset();
    info!("Listing files of {dataset}");

    let mut count = 0;
    let mut bytes = 0;
    for file in client.files(&dataset, args.filters.query()) {
        let file = file.with_context(|| format!("While listing files of {dataset}"))?;
        println!("{}", format_row(&file));
        count += 1;
        bytes += file.size;
    }

    info!("{count} files, {bytes} bytes in total");
    Ok(())
}

fn format_row(file: &DatasetFile) -> String {
    format!(
        "{}\t{}\t{}",
        file.filename,
        file.size,
        file.created.as_deref().unwrap_or("-")
    )
}
