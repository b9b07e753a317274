//! GitHub API Client
//!
//! The [`LabelService`] collaborator contract and its octocrab-backed implementation

use async_trait::async_trait;
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Repository;
use crate::error::{Error, Result};

/// Page size used for every paginated listing
const PAGE_SIZE: u8 = 100;

/// GitHub search never returns more than 1000 results
const MAX_SEARCH_PAGES: u32 = 10;

/// Encode a string for use in URL path segments (RFC 3986 with UTF-8 support)
///
/// Only unreserved characters (A-Z, a-z, 0-9, -, ., _, ~) are left unencoded.
///
/// # Arguments
/// - `input`: The string to encode
///
/// # Returns
/// URL-encoded string safe for use in path segments
fn encode_path_segment(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            // RFC 3986 unreserved characters
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '.' | '_' | '~' => c.to_string(),
            // Everything else gets percent-encoded as UTF-8 bytes
            _ => c
                .to_string()
                .bytes()
                .map(|b| format!("%{:02X}", b))
                .collect::<String>(),
        })
        .collect()
}

/// Check if an octocrab error is a 404 Not Found
fn is_not_found_error(err: &octocrab::Error) -> bool {
    err.to_string().contains("Not Found")
}

/// Check if an octocrab error means the token was rejected (401 or 403)
fn is_auth_error(err: &octocrab::Error) -> bool {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            matches!(source.status_code.as_u16(), 401 | 403)
        }
        _ => false,
    }
}

/// Build an issue search query scoped to one repository
///
/// `search_query("o", "r", "label", "blah")` yields `repo:o/r label:"blah"`.
pub fn search_query(owner: &str, repo: &str, kind: &str, value: &str) -> String {
    format!("repo:{}/{} {}:\"{}\"", owner, repo, kind, value)
}

/// Whether a label with exactly this name (case-sensitive) is in the list
pub fn is_label_in_list(name: &str, labels: &[GitHubLabel]) -> bool {
    labels.iter().any(|label| label.name == name)
}

/// GitHub Label Information
///
/// Represents label information retrieved from the GitHub API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GitHubLabel {
    /// Label ID
    pub id: u64,

    /// Label name
    pub name: String,

    /// Label color (6-digit hexadecimal, without #)
    pub color: String,

    /// Label description
    pub description: Option<String>,

    /// Whether this is a default label
    pub default: bool,

    /// Label URL
    pub url: String,
}

impl From<octocrab::models::Label> for GitHubLabel {
    fn from(label: octocrab::models::Label) -> Self {
        GitHubLabel {
            id: label.id.0,
            name: label.name,
            color: label.color,
            description: label.description,
            default: label.default,
            url: label.url.to_string(),
        }
    }
}

/// Issue (or pull request) returned by a search
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssueRef {
    /// Issue number within its repository
    pub number: u64,

    /// Issue title
    #[serde(default)]
    pub title: String,
}

/// Issues matched by a search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    /// Number of matches GitHub reports, which can exceed `items.len()`
    pub total_count: u64,

    /// Matches actually fetched
    pub items: Vec<IssueRef>,
}

impl SearchResult {
    /// Whether some reported matches were not fetched (GitHub serves at most 1000)
    pub fn is_truncated(&self) -> bool {
        (self.items.len() as u64) < self.total_count
    }
}

/// Label operations needed to reconcile a repository
///
/// Label listings return complete result sets; implementations page
/// internally. Searches report the total match count next to the fetched items.
/// Label operations are keyed by exact label name per repository.
#[async_trait]
pub trait LabelService: Send + Sync {
    /// All labels defined in the repository
    async fn list_labels(&self, repo: &Repository) -> Result<Vec<GitHubLabel>>;

    /// A single label by name
    async fn get_label(&self, repo: &Repository, name: &str) -> Result<GitHubLabel>;

    /// Create a label with the given color (6-digit hex, without #)
    async fn create_label(&self, repo: &Repository, name: &str, color: &str)
        -> Result<GitHubLabel>;

    /// Change the color of an existing label
    async fn edit_label(&self, repo: &Repository, name: &str, color: &str) -> Result<GitHubLabel>;

    /// Delete a label (removing it from every issue)
    async fn delete_label(&self, repo: &Repository, name: &str) -> Result<()>;

    /// Add a label to an issue
    async fn add_label_to_issue(&self, repo: &Repository, number: u64, label: &str) -> Result<()>;

    /// Remove a label from an issue
    async fn remove_label_from_issue(
        &self,
        repo: &Repository,
        number: u64,
        label: &str,
    ) -> Result<()>;

    /// Issues matching a search query, with the reported total
    async fn search_issues(&self, query: &str) -> Result<SearchResult>;
}

#[derive(Serialize)]
struct SearchParams<'a> {
    q: &'a str,
    per_page: u8,
    page: u32,
}

#[derive(Deserialize)]
struct SearchPage {
    total_count: u64,
    #[serde(default)]
    items: Vec<IssueRef>,
}

#[derive(Serialize)]
struct EditLabelBody<'a> {
    color: &'a str,
}

/// GitHub API Client
///
/// Client responsible for interactions with the GitHub API
pub struct GitHubClient {
    octocrab: Octocrab,
}

impl GitHubClient {
    /// Create a new GitHub client
    ///
    /// # Arguments
    /// - `access_token`: GitHub access token
    ///
    /// # Errors
    /// Returns an error if client initialization fails or the token is rejected
    pub async fn new(access_token: &str) -> Result<Self> {
        let octocrab = Octocrab::builder()
            .personal_token(access_token.to_string())
            .build()
            .map_err(|e| Error::generic(format!("Failed to create GitHub client: {}", e)))?;

        Self::authenticated(octocrab).await
    }

    /// Wrap an octocrab instance after checking its credentials against `GET /user`
    ///
    /// # Errors
    /// [`Error::AuthenticationFailed`] if GitHub rejects the token, otherwise
    /// the underlying API error
    pub async fn authenticated(octocrab: Octocrab) -> Result<Self> {
        octocrab.current().user().await.map_err(|e| {
            if is_auth_error(&e) {
                Error::AuthenticationFailed
            } else {
                Error::GitHubApi(e)
            }
        })?;

        Ok(Self { octocrab })
    }

    /// Wrap an already configured octocrab instance without an authentication test
    pub fn from_octocrab(octocrab: Octocrab) -> Self {
        Self { octocrab }
    }

    fn label_route(repo: &Repository, name: &str) -> String {
        format!(
            "/repos/{}/{}/labels/{}",
            repo.owner,
            repo.name,
            encode_path_segment(name)
        )
    }

    /// Get rate limit information
    ///
    /// # Returns
    /// Rate limit status
    pub async fn get_rate_limit(&self) -> Result<RateLimitInfo> {
        let rate_limit = self
            .octocrab
            .ratelimit()
            .get()
            .await
            .map_err(Error::GitHubApi)?;

        Ok(RateLimitInfo {
            limit: rate_limit.resources.core.limit as u32,
            remaining: rate_limit.resources.core.remaining as u32,
            reset_at: chrono::DateTime::from_timestamp(rate_limit.resources.core.reset as i64, 0)
                .unwrap_or_else(chrono::Utc::now),
        })
    }
}

#[async_trait]
impl LabelService for GitHubClient {
    async fn list_labels(&self, repo: &Repository) -> Result<Vec<GitHubLabel>> {
        let mut labels = Vec::new();
        let mut page = 1u32;

        loop {
            debug!(repository = %repo, page, "listing labels");
            let response = self
                .octocrab
                .issues(&repo.owner, &repo.name)
                .list_labels_for_repo()
                .page(page)
                .per_page(PAGE_SIZE)
                .send()
                .await
                .map_err(|e| {
                    if is_not_found_error(&e) {
                        Error::RepositoryNotFound(repo.to_string())
                    } else {
                        Error::GitHubApi(e)
                    }
                })?;

            let received = response.items.len();
            labels.extend(response.items.into_iter().map(GitHubLabel::from));

            if received < PAGE_SIZE as usize {
                break;
            }

            page += 1;
        }

        Ok(labels)
    }

    async fn get_label(&self, repo: &Repository, name: &str) -> Result<GitHubLabel> {
        debug!(repository = %repo, label = name, "fetching label");
        let label: octocrab::models::Label = self
            .octocrab
            .get(Self::label_route(repo, name), None::<&()>)
            .await?;

        Ok(label.into())
    }

    async fn create_label(
        &self,
        repo: &Repository,
        name: &str,
        color: &str,
    ) -> Result<GitHubLabel> {
        debug!(repository = %repo, label = name, color, "creating label");
        let label = self
            .octocrab
            .issues(&repo.owner, &repo.name)
            .create_label(name, color, "")
            .await?;

        Ok(label.into())
    }

    async fn edit_label(&self, repo: &Repository, name: &str, color: &str) -> Result<GitHubLabel> {
        debug!(repository = %repo, label = name, color, "editing label");
        let label: octocrab::models::Label = self
            .octocrab
            .patch(
                Self::label_route(repo, name),
                Some(&EditLabelBody { color }),
            )
            .await?;

        Ok(label.into())
    }

    async fn delete_label(&self, repo: &Repository, name: &str) -> Result<()> {
        debug!(repository = %repo, label = name, "deleting label");
        // URL encode the label name to handle spaces, special characters, and UTF-8
        let encoded_name = encode_path_segment(name);
        self.octocrab
            .issues(&repo.owner, &repo.name)
            .delete_label(&encoded_name)
            .await?;

        Ok(())
    }

    async fn add_label_to_issue(&self, repo: &Repository, number: u64, label: &str) -> Result<()> {
        debug!(repository = %repo, issue = number, label, "adding label to issue");
        self.octocrab
            .issues(&repo.owner, &repo.name)
            .add_labels(number, &[label.to_string()])
            .await?;

        Ok(())
    }

    async fn remove_label_from_issue(
        &self,
        repo: &Repository,
        number: u64,
        label: &str,
    ) -> Result<()> {
        debug!(repository = %repo, issue = number, label, "removing label from issue");
        // octocrab encodes this path segment itself
        self.octocrab
            .issues(&repo.owner, &repo.name)
            .remove_label(number, label)
            .await?;

        Ok(())
    }

    async fn search_issues(&self, query: &str) -> Result<SearchResult> {
        let mut result = SearchResult::default();
        let mut page = 1u32;

        loop {
            debug!(query, page, "searching issues");
            let response: SearchPage = self
                .octocrab
                .get(
                    "/search/issues",
                    Some(&SearchParams {
                        q: query,
                        per_page: PAGE_SIZE,
                        page,
                    }),
                )
                .await?;

            let received = response.items.len();
            result.total_count = response.total_count;
            result.items.extend(response.items);

            if received < PAGE_SIZE as usize
                || !result.is_truncated()
                || page >= MAX_SEARCH_PAGES
            {
                break;
            }

            page += 1;
        }

        Ok(result)
    }
}

/// Rate Limit Information
///
/// Represents GitHub API rate limit status
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    /// Hourly limit
    pub limit: u32,

    /// Remaining usage count
    pub remaining: u32,

    /// Reset time
    pub reset_at: chrono::DateTime<chrono::Utc>,
}
