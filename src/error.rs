//! Error Handling
//!
//! Error type definitions used in gh-label-sync

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error types for gh-label-sync
#[derive(Error, Debug)]
pub enum Error {
    #[error("GitHub API error: {0}")]
    GitHubApi(#[from] octocrab::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Configuration validation error: {0}")]
    ConfigValidation(String),

    #[error("Label validation error: {0}")]
    LabelValidation(String),

    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("Authentication failed: invalid token")]
    AuthenticationFailed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid repository format: {0} (expected 'owner/repo')")]
    InvalidRepositoryFormat(String),

    #[error("Invalid label color: {0} (expected 6-digit hex, optionally prefixed with #)")]
    InvalidLabelColor(String),

    #[error("{0}")]
    Generic(String),
}

impl Error {
    /// Create a new configuration validation error
    pub fn config_validation<S: Into<String>>(message: S) -> Self {
        Error::ConfigValidation(message.into())
    }

    /// Create a new label validation error
    pub fn label_validation<S: Into<String>>(message: S) -> Self {
        Error::LabelValidation(message.into())
    }

    /// Create an error that carries only a message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Error::Generic(message.into())
    }

    /// Whether this error aborts the run before any API call is made
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Json(_)
                | Error::Yaml(_)
                | Error::Toml(_)
                | Error::ConfigValidation(_)
                | Error::LabelValidation(_)
                | Error::InvalidRepositoryFormat(_)
                | Error::InvalidLabelColor(_)
        )
    }
}
