use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SentryError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Frame source error: {0}")]
    FrameSource(#[from] FrameSourceError),

    #[error("Analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl SentryError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Errors at the command/event channel boundary
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed command: {details}")]
    MalformedCommand { details: String },

    #[error("Command channel closed")]
    ChannelClosed,

    #[error("Failed to encode sink message: {details}")]
    Encode { details: String },
}

/// Errors raised by a frame source (camera device or stand-in)
#[derive(Error, Debug)]
pub enum FrameSourceError {
    #[error("Still capture to {path} failed: {details}")]
    Capture { path: PathBuf, details: String },

    #[error("Recording operation failed: {details}")]
    Recording { details: String },

    #[error("Invalid frame source state: {details}")]
    InvalidState { details: String },

    #[error("Frame stream error: {details}")]
    Stream { details: String },

    #[error("Frame feed ended before a motion verdict")]
    FeedEnded,
}

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Frame processing failed: {details}")]
    FrameProcessing { details: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreation {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, SentryError>;
