//! # gh-label-sync
//!
//! Keep GitHub label taxonomies consistent across many repositories
//!
//! ## Features
//! - Create missing labels and correct label colors
//! - Delete deprecated labels
//! - Migrate issues from legacy labels onto their replacement, then retire the legacy label
//! - Dry-run mode

pub mod config;
pub mod error;
pub mod github;
pub mod reconcile;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{Config, LabelRule, Repository};
pub use error::{Error, Result};
pub use github::{GitHubClient, LabelService, SearchResult};
pub use reconcile::{ReconcileOperation, Reconciler, RuleOutcome};
pub use sync::{LabelSyncer, SyncReport};

/// Apply every label rule of `config` to every configured repository
///
/// # Examples
///
/// ```rust,no_run
/// use gh_label_sync::{Config, LabelRule};
///
/// #[tokio::main]
/// async fn main() -> gh_label_sync::Result<()> {
///     let config = Config {
///         repositories: vec!["acme/widgets".to_string()],
///         labels: vec![LabelRule::new("bug", "d73a4a")?.with_mappings(["defect"])],
///     };
///
///     let report = gh_label_sync::sync_repositories("your_github_token", config, false).await?;
///     println!("Sync completed: {:?}", report);
///     Ok(())
/// }
/// ```
///
/// # Errors
/// Returns an error if the configuration is invalid or the token is rejected.
/// Per-rule API failures are collected in [`SyncReport::errors`].
pub async fn sync_repositories(
    access_token: &str,
    config: Config,
    dry_run: bool,
) -> Result<SyncReport> {
    config.validate()?;

    let client = GitHubClient::new(access_token).await?;
    let syncer = LabelSyncer::new(client, config).dry_run(dry_run);
    Ok(syncer.run().await)
}
