use thiserror::Error;

/// Errors surfaced by a page fetch.
///
/// `Validation` is raised before anything is dispatched and never changes
/// controller state; every other kind moves the collection to `Failed`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid query: {0}")]
    Validation(String),

    #[error("Request not authorized: {0}")]
    Authorization(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl QueryError {
    /// True when the error was produced before any request went out.
    pub fn is_validation(&self) -> bool {
        matches!(self, QueryError::Validation(_))
    }
}

impl From<reqwest::Error> for QueryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            QueryError::MalformedResponse(err.to_string())
        } else {
            QueryError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::MalformedResponse(err.to_string())
    }
}

/// Errors raised while assembling [`crate::config_utils::Settings`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Couldn't read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Couldn't parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },

    #[error("Invalid setting {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Invalid request header {0}")]
    InvalidHeader(String),
}
