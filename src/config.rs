//! Configuration Management
//!
//! Repository list and label rule loading, validation and discovery

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Convention-based configuration file names searched in order
pub const CONVENTION_CONFIG_FILES: &[&str] = &[
    "config.toml",
    ".gh-label-sync.toml",
    ".gh-label-sync.json",
    ".gh-label-sync.yaml",
    ".gh-label-sync.yml",
    ".github/label-sync.toml",
];

/// Label Rule
///
/// Desired state of one label, applied to every configured repository
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LabelRule {
    /// Label name (unique within the configuration)
    pub name: String,

    /// Label color (6-digit hex code, `#` prefix optional)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub color: String,

    /// Legacy label names whose issues are migrated onto this label
    #[serde(default, alias = "aliases", skip_serializing_if = "Vec::is_empty")]
    pub mappings: Vec<String>,

    /// Deletion flag (if true, delete this label)
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub delete: bool,
}

impl LabelRule {
    /// Create a new label rule
    ///
    /// # Errors
    /// Returns an error if the color format is invalid
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Result<Self> {
        let rule = Self {
            name: name.into(),
            color: color.into(),
            ..Default::default()
        };

        rule.validate()?;
        Ok(rule)
    }

    /// Attach legacy label names to migrate from
    pub fn with_mappings<I, S>(mut self, mappings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mappings = mappings.into_iter().map(Into::into).collect();
        self
    }

    /// Create a rule that deletes the named label
    pub fn deletion(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delete: true,
            ..Default::default()
        }
    }

    /// Validate label rule
    ///
    /// # Errors
    /// - If the name is empty
    /// - If a non-deleting rule has an invalid color
    /// - If the rule maps from its own name
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::label_validation("Label name cannot be empty"));
        }

        if !self.delete && !is_valid_hex_color(&self.normalized_color()) {
            return Err(Error::InvalidLabelColor(format!(
                "{} (label '{}')",
                self.color, self.name
            )));
        }

        if self.mappings.iter().any(|m| m == &self.name) {
            return Err(Error::label_validation(format!(
                "Label '{}' cannot be mapped from itself",
                self.name
            )));
        }

        if self.mappings.iter().any(|m| m.trim().is_empty()) {
            return Err(Error::label_validation(format!(
                "Label '{}' has an empty mapping",
                self.name
            )));
        }

        Ok(())
    }

    /// Configured color in the form GitHub stores it
    pub fn normalized_color(&self) -> String {
        normalize_color(&self.color)
    }
}

/// Normalize color (remove # and convert to lowercase)
pub fn normalize_color(color: &str) -> String {
    color.trim().trim_start_matches('#').to_lowercase()
}

/// Repository identifier in `owner/name` form
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repository {
    pub owner: String,
    pub name: String,
}

impl Repository {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for Repository {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_repository(s)
    }
}

/// Parse repository string into owner and name
///
/// # Arguments
/// - `repo`: Repository string in "owner/repo" format
///
/// # Errors
/// Returns an error if the format is invalid
pub fn parse_repository(repo: &str) -> Result<Repository> {
    let parts: Vec<&str> = repo.trim().split('/').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(Error::InvalidRepositoryFormat(repo.to_string()));
    }
    Ok(Repository::new(parts[0], parts[1]))
}

/// Sync Configuration
///
/// Target repositories and the label rules applied to each of them
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    /// Target repositories (owner/repo format), processed in order
    #[serde(default)]
    pub repositories: Vec<String>,

    /// Label rules, processed in order
    #[serde(default, rename = "label", alias = "labels")]
    pub labels: Vec<LabelRule>,
}

impl Config {
    /// Validate configuration
    ///
    /// # Errors
    /// - If a repository format is invalid
    /// - If a label rule is invalid or defined twice
    pub fn validate(&self) -> Result<()> {
        for repo in &self.repositories {
            parse_repository(repo)?;
        }

        let mut seen = HashSet::new();
        for label in &self.labels {
            label.validate()?;
            if !seen.insert(label.name.as_str()) {
                return Err(Error::label_validation(format!(
                    "Label '{}' is defined more than once",
                    label.name
                )));
            }
        }

        Ok(())
    }

    /// Replace the target repositories with the given list, if any
    pub fn restrict_to(&mut self, repositories: &[String]) {
        if repositories.is_empty() {
            return;
        }
        self.repositories = repositories.to_vec();
    }
}

/// Generate a sample configuration
///
/// Used by the `init` command as a starting point
pub fn sample_config() -> Config {
    Config {
        repositories: vec!["owner/repo".to_string()],
        labels: vec![
            LabelRule {
                name: "bug".to_string(),
                color: "d73a4a".to_string(),
                mappings: vec!["defect".to_string()],
                delete: false,
            },
            LabelRule {
                name: "enhancement".to_string(),
                color: "a2eeef".to_string(),
                mappings: vec!["feature".to_string()],
                delete: false,
            },
            LabelRule {
                name: "documentation".to_string(),
                color: "0075ca".to_string(),
                mappings: vec!["docs".to_string()],
                delete: false,
            },
            LabelRule {
                name: "good first issue".to_string(),
                color: "7057ff".to_string(),
                mappings: vec!["beginner-friendly".to_string()],
                delete: false,
            },
            LabelRule::deletion("wontfix"),
        ],
    }
}

/// Parse configuration from a content string, detecting format by file path extension
///
/// # Errors
/// If parsing or validation fails, or if the extension is unsupported
pub fn parse_config_from_content(content: &str, path: &Path) -> Result<Config> {
    let config: Config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(content)?,
        Some("json") => serde_json::from_str(content)?,
        Some("yaml") | Some("yml") => serde_yaml::from_str(content)?,
        _ => {
            return Err(Error::config_validation(format!(
                "Configuration file must be .toml, .json, .yaml, or .yml: {}",
                path.display()
            )));
        }
    };

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file, detecting format by extension
///
/// # Arguments
/// - `path`: Path to the configuration file (.toml, .json, .yaml, or .yml)
///
/// # Errors
/// If file reading, parsing, or validation fails, or if the extension is unsupported
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(Error::config_validation(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    parse_config_from_content(&content, path)
}

/// Search for a convention-based configuration file in the current directory
///
/// Searches for files in [`CONVENTION_CONFIG_FILES`] order and returns
/// the first one found.
pub fn find_convention_config() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_convention_config_in(&cwd)
}

/// Search for a convention-based configuration file in the given directory
pub fn find_convention_config_in(dir: &Path) -> Option<PathBuf> {
    CONVENTION_CONFIG_FILES
        .iter()
        .map(|filename| dir.join(filename))
        .find(|path| path.exists())
}

/// Validate hex color code
///
/// # Arguments
/// - `color`: Color code (6-digit hex without #)
fn is_valid_hex_color(color: &str) -> bool {
    if color.len() != 6 {
        return false;
    }

    color.chars().all(|c| c.is_ascii_hexdigit())
}
