use std::path::PathBuf;

/// Failure to load the topics configuration file.
///
/// Every variant is recoverable: the caller is expected to log it and fall
/// back to an empty registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Topics file {} not found", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read topics file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing topics file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
