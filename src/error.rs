// Error types for the converter.

use thiserror::Error;

/// Configuration could not be loaded or validated.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read converter config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse converter config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("incorrect namespace name={namespace:?} for env var={var:?} with value: {value:?} must match regex: {pattern:?}")]
    InvalidNamespace {
        namespace: String,
        var: String,
        value: String,
        pattern: String,
    },
    #[error("namespace selector {0:?} must have the form key:value")]
    InvalidNamespaceSelector(String),
}

/// A legacy object (or one entry of it) could not be converted.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("datasource entry {index} ({name:?}): cannot encode {field}: {source}")]
    DatasourceJson {
        index: usize,
        name: String,
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("datasource entry {index} ({name:?}): {field} must be a JSON object")]
    DatasourceJsonShape {
        index: usize,
        name: String,
        field: &'static str,
    },
    #[error("cannot parse embedded contact point of {namespace}/{name}: {source}")]
    ContactPoint {
        namespace: String,
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Outcome of a store call other than success.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("conflict writing {0}")]
    Conflict(String),
    #[error("api error: {0}")]
    Api(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// The watch substrate reported a failure.
#[derive(Debug, Error)]
pub enum InformerError {
    #[error("watch failed: {0}")]
    Watch(String),
    #[error("watch stream ended before initial sync")]
    EndedBeforeSync,
}

/// Top-level converter errors.
#[derive(Debug, Error)]
pub enum ConverterError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Informer(#[from] InformerError),
    #[error("cannot compare specs: {0}")]
    Digest(#[from] crate::codec::CodecError),
    #[error("{kind} watcher for {scope} failed: {source}")]
    Watcher {
        kind: crate::types::ResourceKind,
        scope: String,
        #[source]
        source: InformerError,
    },
    #[error("converter was cancelled before all watchers synced")]
    Cancelled,
}

pub type ConverterResult<T> = Result<T, ConverterError>;
