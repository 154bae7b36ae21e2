use thiserror::Error;

/// Errors produced by the admission-control layer and its configuration.
///
/// Admission decisions themselves never fail; they are expressed as
/// `bool` / [`Verdict`](crate::Verdict) / [`Admission`](crate::Admission).
#[derive(Debug, Error)]
pub enum OpsError {
    #[error("config parse error: {0}")]
    ConfigParse(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl From<toml::de::Error> for OpsError {
    fn from(e: toml::de::Error) -> Self {
        OpsError::ConfigParse(e.to_string())
    }
}

pub type OpsResult<T> = Result<T, OpsError>;
