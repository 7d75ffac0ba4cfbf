use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectorError {
    #[error("detector '{detector}' failed: {message}")]
    Fault { detector: String, message: String },

    #[error("detector '{detector}' panicked: {message}")]
    Panicked { detector: String, message: String },
}

impl DetectorError {
    pub fn fault(detector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fault {
            detector: detector.into(),
            message: message.into(),
        }
    }

    pub fn panicked(detector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Panicked {
            detector: detector.into(),
            message: message.into(),
        }
    }

    pub fn detector(&self) -> &str {
        match self {
            Self::Fault { detector, .. } | Self::Panicked { detector, .. } => detector,
        }
    }
}
