use std::{fs::File, io::BufWriter, path::PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use super::DataDirArgs;
use crate::{
    labels::{find_radar_files, label_files, write_labels, LabelSummary},
    radar::{ClutterMask, Hdf5Reader, RainCriteria},
};

#[derive(clap::Args, Clone)]
pub struct Args {
    #[command(flatten)]
    pub data_dir: DataDirArgs,

    /// Where to write the labels
    #[arg(short, long, default_value = "rainy_labels.csv")]
    pub output: PathBuf,

    /// A .npy array with the same shape as the radar images, 0 where pixels tend to contain
    /// clutter. Without it no pixels are masked
    #[arg(long, env = "WEATHERGEN_CLUTTER_MASK")]
    pub clutter_mask: Option<PathBuf>,

    #[command(flatten)]
    pub criteria: CriteriaArgs,
}

#[derive(clap::Args, Clone)]
pub struct CriteriaArgs {
    /// Showers with fewer pixels than this are ignored
    #[arg(long, default_value_t = RainCriteria::default().min_object_size)]
    pub min_object_size: usize,

    /// Precipitation summed over valid showers needs to exceed this for an image to be rainy
    #[arg(long, default_value_t = RainCriteria::default().rain_sum_threshold)]
    pub rain_threshold: f64,

    /// Gradient magnitude above which a pixel counts towards clutter
    #[arg(long, default_value_t = RainCriteria::default().gradient_threshold)]
    pub gradient_threshold: f64,

    /// Images with more steep pixels than this are considered cluttered
    #[arg(long, default_value_t = RainCriteria::default().clutter_min_pixels)]
    pub clutter_min_pixels: usize,
}

impl From<&CriteriaArgs> for RainCriteria {
    fn from(args: &CriteriaArgs) -> Self {
        RainCriteria {
            min_object_size: args.min_object_size,
            rain_sum_threshold: args.rain_threshold,
            gradient_threshold: args.gradient_threshold,
            clutter_min_pixels: args.clutter_min_pixels,
        }
    }
}

pub fn label(args: &Args) -> Result<()> {
    let dir = args.data_dir.resolve();
    if !dir.is_dir() {
        bail!("Data directory {} does not exist", dir.display());
    }

    let mask = args
        .clutter_mask
        .as_deref()
        .map(ClutterMask::load)
        .transpose()?;
    if mask.is_none() {
        warn!("No clutter mask given, precipitation is summed over every pixel");
    }

    let files = find_radar_files(&dir)?;
    if files.is_empty() {
        warn!("No radar files found in {}", dir.display());
    } else if !cfg!(feature = "hdf5") {
        bail!("Built without HDF5 support, rebuild with `--features hdf5` to read radar files");
    }
    info!("Processing {} radar files", files.len());

    let criteria = RainCriteria::from(&args.criteria);
    let labels = label_files(&files, &Hdf5Reader, mask.as_ref(), &criteria);

    let out = File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    write_labels(&labels, BufWriter::new(out))?;

    let summary = LabelSummary::of(&labels);
    info!(
        "Wrote {} labels to {}: {} rainy, {} dry, {} failed",
        labels.len(),
        args.output.display(),
        summary.rainy,
        summary.dry,
        summary.failed
    );
    Ok(())
}
