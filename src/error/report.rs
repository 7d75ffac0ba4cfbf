use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write report to {target}: {source}")]
    WriteError {
        target: String,
        source: std::io::Error,
    },
}

impl ReportError {
    pub fn write_error(target: impl Into<String>, source: std::io::Error) -> Self {
        Self::WriteError {
            target: target.into(),
            source,
        }
    }
}
