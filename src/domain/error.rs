// Typed errors surfaced by the data core
use thiserror::Error;

pub type DashboardResult<T> = Result<T, DashboardError>;

/// Failures the core reports to its callers.
///
/// Every variant carries owned strings so the error is `Clone`: a single
/// in-flight fetch hands the same outcome to every caller waiting on it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DashboardError {
    /// Network or HTTP failure talking to a data source
    #[error("fetch failed for {resource}: {message}")]
    Fetch { resource: String, message: String },

    /// Source text could not be turned into the expected records
    #[error("could not parse {resource}: {message}")]
    Parse { resource: String, message: String },

    /// Fewer usable points than the viewer needs
    #[error("insufficient data for {resource}: {points} points (need {required})")]
    InsufficientData {
        resource: String,
        points: usize,
        required: usize,
    },

    /// Missing or invalid id or time range
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter { name: String, message: String },
}

impl DashboardError {
    pub fn fetch(resource: impl Into<String>, message: impl ToString) -> Self {
        Self::Fetch {
            resource: resource.into(),
            message: message.to_string(),
        }
    }

    pub fn parse(resource: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            resource: resource.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid(name: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            message: message.to_string(),
        }
    }

    /// Errors the caller should answer with synthetic data rather than a banner only.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidParameter { .. })
    }
}
