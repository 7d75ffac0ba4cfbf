use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {message}")]
    FileReadError { path: PathBuf, message: String },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("unsupported config format: {format} (expected json or yaml)")]
    UnsupportedFormat { format: String },

    #[error("unknown detector id: {id}")]
    UnknownDetector { id: String },

    #[error("invalid threshold {name}: {message}")]
    InvalidThreshold { name: String, message: String },
}

impl ConfigError {
    pub fn file_read_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::FileReadError {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn parse_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn unknown_detector(id: impl Into<String>) -> Self {
        Self::UnknownDetector { id: id.into() }
    }

    pub fn invalid_threshold(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidThreshold {
            name: name.into(),
            message: message.into(),
        }
    }
}
