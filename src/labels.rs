use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use anyhow::{Context, Result};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Serialize, Serializer};
use tracing::{debug, error, info};

use crate::{
    archive::find_with_extension,
    radar::{assess, ClutterMask, RadarReader, RainCriteria},
};

const PROGRESS_EVERY: usize = 1000;

/// Whether a radar file shows rain. `rainy` is `None` when the file could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RainLabel {
    pub filename: String,
    #[serde(serialize_with = "serialize_flag")]
    pub rainy: Option<bool>,
}

// Spelled the way pandas writes booleans, so existing notebooks keep reading the file
fn serialize_flag<S: Serializer>(value: &Option<bool>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(match value {
        Some(true) => "True",
        Some(false) => "False",
        None => "",
    })
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LabelSummary {
    pub rainy: usize,
    pub dry: usize,
    pub failed: usize,
}

impl LabelSummary {
    pub fn of(labels: &[RainLabel]) -> Self {
        labels
            .iter()
            .fold(LabelSummary::default(), |mut acc, label| {
                match label.rainy {
                    Some(true) => acc.rainy += 1,
                    Some(false) => acc.dry += 1,
                    None => acc.failed += 1,
                }
                acc
            })
    }
}

/// Radar files (`*.h5`) directly inside `dir`, sorted by name.
pub fn find_radar_files(dir: &Path) -> Result<Vec<PathBuf>> {
    find_with_extension(dir, "h5")
}

/// Labels every file in parallel. The output keeps the order of `files`; a file that fails to
/// read is logged and labelled `None` instead of aborting the run.
pub fn label_files<R: RadarReader>(
    files: &[PathBuf],
    reader: &R,
    mask: Option<&ClutterMask>,
    criteria: &RainCriteria,
) -> Vec<RainLabel> {
    let done = AtomicUsize::new(0);
    let total = files.len();

    files
        .par_iter()
        .map(|path| {
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());

            let rainy = match reader
                .read(path)
                .and_then(|image| assess(&image, mask, criteria))
            {
                Ok(assessment) => {
                    debug!(
                        "{filename}: shower sum {:.0}, {} steep pixels",
                        assessment.shower_sum, assessment.steep_pixels
                    );
                    Some(assessment.rainy)
                }
                Err(e) => {
                    error!("Error processing {}: {e}", path.display());
                    None
                }
            };

            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            if finished % PROGRESS_EVERY == 0 {
                info!("Processed {finished}/{total} radar files");
            }

            RainLabel { filename, rainy }
        })
        .collect()
}

/// Writes labels as CSV with a `filename,rainy` header.
pub fn write_labels<W: Write>(labels: &[RainLabel], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    if labels.is_empty() {
        csv.write_record(["filename", "rainy"])?;
    }
    for label in labels {
        csv.serialize(label)
            .with_context(|| format!("Failed to write label for {}", label.filename))?;
    }
    csv.flush()?;
    Ok(())
}
