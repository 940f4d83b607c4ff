use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

use argh::FromArgs;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::command::Error;
use crate::configuration::Configuration;
use crate::registry::blob_store::{BlobStorageConfig, BlobStoreHandle};
use crate::registry::metadata_store::{MetadataStore, MetadataStoreConfig};
use crate::registry::stats::{ExpansionMode, ReportRenderer, StatsCollector};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("unknown format '{s}', expected 'text' or 'json'")),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "stats",
    description = "Report tagged, untagged and orphan content of the storage"
)]
pub struct Options {
    #[argh(option, short = 'f', default = "OutputFormat::Text")]
    /// output format: `text` (default) or `json`
    pub format: OutputFormat,
    #[argh(switch, short = 'r')]
    /// mark the content of nested manifest lists too
    pub recursive: bool,
}

pub struct Command {
    collector: StatsCollector,
    renderer: ReportRenderer,
    format: OutputFormat,
}

fn build_blob_store(config: &BlobStorageConfig) -> Result<BlobStoreHandle, Error> {
    match config.to_handle() {
        Ok(handle) => Ok(handle),
        Err(err) => {
            let msg = format!("Failed to initialize blob store: {err}");
            Err(Error::Initialization(msg))
        }
    }
}

fn build_metadata_store(config: &MetadataStoreConfig) -> Result<Arc<dyn MetadataStore>, Error> {
    match config.to_backend() {
        Ok(store) => Ok(store),
        Err(err) => {
            let msg = format!("Failed to initialize metadata store: {err}");
            Err(Error::Initialization(msg))
        }
    }
}

impl Command {
    pub fn new(
        options: &Options,
        config: &Configuration,
        cancellation: CancellationToken,
    ) -> Result<Self, Error> {
        let blob_store = build_blob_store(&config.blob_store)?;
        let metadata_store = build_metadata_store(&config.metadata_store)?;

        let expansion = if options.recursive {
            ExpansionMode::Recursive
        } else {
            config.stats.expansion_mode()
        };

        let collector = StatsCollector::new(
            metadata_store.clone(),
            blob_store.clone(),
            config.stats.page_size,
            expansion,
            cancellation,
        );
        let renderer = ReportRenderer::new(metadata_store, blob_store);

        Ok(Self {
            collector,
            renderer,
            format: options.format,
        })
    }

    pub async fn run(&self) -> Result<(), Error> {
        let output = self.execute().await?;

        let mut stdout = std::io::stdout().lock();
        stdout.write_all(output.as_bytes())?;
        stdout.flush()?;

        Ok(())
    }

    async fn execute(&self) -> Result<String, Error> {
        info!("Collecting storage statistics");
        let report = self.collector.collect().await?;

        match self.format {
            OutputFormat::Text => Ok(self.renderer.render(&report).await),
            OutputFormat::Json => {
                let mut output = serde_json::to_string_pretty(&report)?;
                output.push('\n');
                Ok(output)
            }
        }
    }
}
