use crate::delta::merge_graph::MergeGraphError;
use crate::downloader::DownloadError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Parsing(#[from] ParseError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    MergeGraph(#[from] MergeGraphError),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("invalid value for environment variable {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("malformed row in {file} at byte offset {offset}: expected at least {expected} fields, found {found}")]
    MalformedRow {
        file: String,
        offset: u64,
        expected: usize,
        found: usize,
    },

    #[error("malformed row count ({count}) exceeded threshold ({threshold}) while parsing {file}")]
    ThresholdExceeded { file: String, count: usize, threshold: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum TransformError {
    #[error("concept stream referenced an unknown cui: {0}")]
    UnknownCui(String),
}

#[derive(thiserror::Error, Debug)]
pub enum VersionError {
    #[error("requested version {requested} is not newer than the installed version {installed}")]
    NotNewer { requested: String, installed: String },

    #[error("requested version {0} matches the installed version; pass --reapply to force a re-run")]
    AlreadyInstalled(String),
}

#[derive(thiserror::Error, Debug)]
pub enum GraphError {
    #[error("failed to connect to the graph database: {0}")]
    Connection(String),

    #[error("transient graph error, retries exhausted after {attempts} attempts: {message}")]
    Transient { attempts: u32, message: String },

    #[error("permanent graph error: {0}")]
    Permanent(String),

    #[error("server does not support the required batched-iteration capability")]
    UnsupportedCapability,
}
