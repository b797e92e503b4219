use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Unsupported storage url '{0}'")]
    InvalidUrl(String),

    #[error("Failed to configure object store for '{url}'")]
    Configure {
        url: String,
        #[source]
        source: object_store::Error,
    },

    #[error("Failed to determine local data directory")]
    DataDirResolution,

    #[error("Failed to create storage directory '{0}'")]
    DirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to list objects under '{prefix}'")]
    List {
        prefix: String,
        #[source]
        source: object_store::Error,
    },

    #[error("Failed to read object '{key}'")]
    Read {
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("Failed to write object '{key}'")]
    Write {
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("Object '{key}' already exists")]
    AlreadyExists { key: String },
}
