use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("no source units supplied")]
    EmptyInput,

    #[error("none of {attempted} source units could be loaded ({unsupported} unsupported)")]
    NoLoadableUnits { attempted: usize, unsupported: usize },
}
