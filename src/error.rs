//! Error types for the rendering pipeline

use thiserror::Error;

/// Result type alias for rendering operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving assets, laying out or rasterizing.
///
/// Every payload is an owned message so the error is `Clone`; resolution
/// results are shared between concurrent waiters of the same asset request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Failed to initialize the engine
    #[error("Engine initialization failed: {0}")]
    InitializationError(String),

    /// A web font subset could not be located or downloaded
    #[error("Failed to download dynamic font: {0}")]
    FontResolutionError(String),

    /// An emoji image could not be downloaded
    #[error("Failed to load emoji: {0}")]
    EmojiResolutionError(String),

    /// The layout engine rejected the element tree
    #[error("Layout failed: {0}")]
    LayoutError(String),

    /// A rasterizer backend failed to convert the document
    #[error("Conversion failed: {0}")]
    ConversionError(String),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::NetworkError(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Other(err.to_string())
    }
}
