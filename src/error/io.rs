use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("failed to read file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid UTF-8 in '{path}' at byte {valid_up_to}")]
    InvalidEncoding { path: PathBuf, valid_up_to: usize },

    #[error("unsupported language for '{path}': {reason}")]
    UnsupportedLanguage { path: PathBuf, reason: String },

    #[error("failed to scan directory at {path}: {source}")]
    DirectoryScanError {
        path: PathBuf,
        source: walkdir::Error,
    },
}

impl LoadError {
    /// Maps an I/O failure onto the most specific variant.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::FileNotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::ReadError { path, source },
        }
    }

    pub fn invalid_encoding(path: impl Into<PathBuf>, valid_up_to: usize) -> Self {
        Self::InvalidEncoding {
            path: path.into(),
            valid_up_to,
        }
    }

    pub fn unsupported_language(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::UnsupportedLanguage {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn is_unsupported_language(&self) -> bool {
        matches!(self, Self::UnsupportedLanguage { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_not_found_display() {
        let err = LoadError::from_io(
            "/path/to/Missing.java",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert_eq!(err.to_string(), "file not found: /path/to/Missing.java");
    }

    #[test]
    fn test_permission_denied_mapping() {
        let err = LoadError::from_io(
            "/root/secret.py",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, LoadError::PermissionDenied { .. }));
        assert!(!err.is_unsupported_language());
    }

    #[test]
    fn test_invalid_encoding_display() {
        let err = LoadError::invalid_encoding("blob.go", 17);
        assert_eq!(err.to_string(), "invalid UTF-8 in 'blob.go' at byte 17");
    }

    #[test]
    fn test_unsupported_language_display() {
        let err = LoadError::unsupported_language("util.h", "ambiguous extension 'h'");
        assert_eq!(
            err.to_string(),
            "unsupported language for 'util.h': ambiguous extension 'h'"
        );
        assert!(err.is_unsupported_language());
    }
}
