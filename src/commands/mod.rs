pub mod download;
pub mod extract;
pub mod label;
pub mod list;

use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rayon::ThreadPoolBuilder;

use crate::{
    config::{KdpConfig, DEFAULT_BASE_URL, DEFAULT_DATASET, DEFAULT_DATASET_VERSION},
    error::CommandError,
    kdp::{DatasetRef, KdpClient, ListQuery, OrderBy, Sorting},
    utils::{default_data_dir, token::load_token},
};

const TOKEN_HINT: &str = "put `KDP_TOKEN=<your api key>` in a .env file or the environment, \
     see https://developer.dataplatform.knmi.nl/open-data-api#token";

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// The dotenv file to read KDP_TOKEN from. Defaults to the nearest .env in the working
    /// directory or its parents
    #[arg(long, global = true, env = "WEATHERGEN_ENV_FILE")]
    env_file: Option<PathBuf>,

    /// The KDP Open Data API to talk to
    #[arg(long, global = true, env = "KDP_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Number of worker threads used when labeling radar files
    #[arg(long, global = true, env = "WEATHERGEN_THREADS")]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the files of a KDP dataset
    List(list::Args),

    /// Download the files of a KDP dataset into the data directory, and unpack the archives
    Download(download::Args),

    /// Unpack every tar archive in the data directory
    Extract(extract::Args),

    /// Label every radar file in the data directory as rainy or not, writing the result as CSV
    Label(label::Args),
}

#[derive(clap::Args, Clone)]
pub struct DatasetArgs {
    /// The dataset name, e.g. nl_rdr_data_rtcor_5m_tar for daily archives of 5 minute radar
    /// precipitation, or nl_rdr_data_rtcor_5m for individual files
    #[arg(long, default_value = DEFAULT_DATASET)]
    pub dataset: String,

    /// The dataset version
    #[arg(long = "dataset-version", default_value = DEFAULT_DATASET_VERSION)]
    pub dataset_version: String,
}

impl DatasetArgs {
    pub fn dataset(&self) -> DatasetRef {
        DatasetRef::new(&self.dataset, &self.dataset_version)
    }
}

#[derive(clap::Args, Clone)]
pub struct FilterArgs {
    /// Only files from this date on (UTC, YYYY-MM-DD)
    #[arg(long, default_value = "2024-01-01")]
    pub begin: Option<NaiveDate>,

    /// Only files before this date (UTC, YYYY-MM-DD)
    #[arg(long, default_value = "2024-02-01")]
    pub end: Option<NaiveDate>,

    /// Drop the date filters and consider the whole dataset
    #[arg(long, default_value = "false", conflicts_with_all = ["begin", "end"])]
    pub all_dates: bool,

    #[arg(long, value_enum, default_value_t = OrderBy::Created)]
    pub order_by: OrderBy,

    #[arg(long, value_enum, default_value_t = Sorting::Asc)]
    pub sorting: Sorting,

    /// Files requested per page
    #[arg(long, default_value_t = 31)]
    pub page_size: usize,

    /// Stop after this many files
    #[arg(long)]
    pub limit: Option<usize>,
}

impl FilterArgs {
    pub fn query(&self) -> ListQuery {
        let (begin, end) = if self.all_dates {
            (None, None)
        } else {
            (self.begin, self.end)
        };
        ListQuery {
            max_keys: self.page_size.max(1),
            order_by: self.order_by,
            sorting: self.sorting,
            begin,
            end,
            limit: self.limit,
        }
    }
}

#[derive(clap::Args, Clone)]
pub struct DataDirArgs {
    /// Where radar archives and images are stored. Defaults to ~/weathergenerator/data
    #[arg(long, env = "WEATHERGEN_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

impl DataDirArgs {
    pub fn resolve(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }
}

impl Cli {
    pub fn run() -> Result<(), CommandError> {
        let command = Cli::parse();

        if let Some(threads) = command.threads {
            ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()
                .context("Failed to set up the worker thread pool")?;
        }

        match &command.command {
            Commands::List(args) => list::list(&command.client()?, args)?,
            Commands::Download(args) => download::download(&command.client()?, args)?,
            Commands::Extract(args) => extract::extract(args)?,
            Commands::Label(args) => label::label(args)?,
        }

        Ok(())
    }

    fn client(&self) -> Result<KdpClient, CommandError> {
        let token = load_token(self.env_file.as_deref())
            .map_err(|e| CommandError::with_hint(e.into(), TOKEN_HINT))?;
        let config = KdpConfig::default().with_base_url(&self.base_url);
        let client = KdpClient::new(config, token).context("Failed to build HTTP client")?;
        Ok(client)
    }
}
