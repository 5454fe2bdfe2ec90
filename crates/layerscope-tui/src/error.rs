use std::io;
use std::path::PathBuf;

use layerscope_core::CoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DashboardError>;

#[derive(Error, Debug)]
pub enum DashboardError {
    /// Every requested panel name was unknown (or none was requested).
    #[error("no valid panels selected; run with --list-panels to see the available panels")]
    NoPanelsSelected,

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Io(#[from] io::Error),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The snapshot producer thread went away without finishing the run.
    #[error("snapshot producer stopped unexpectedly")]
    ProducerGone,
}
