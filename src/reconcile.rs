//! Label Reconciliation
//!
//! Brings one repository's label state and issue tagging into line with one
//! label rule: create or recolor (or delete) the label, then move issues off
//! each legacy label and retire it.

use tracing::{info, warn};

use crate::config::{normalize_color, LabelRule, Repository};
use crate::error::Result;
use crate::github::{is_label_in_list, search_query, LabelService};

/// Operations performed (or planned, in dry-run mode) for one rule
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOperation {
    /// Label was missing and has been created
    Create { name: String, color: String },

    /// Label color differed and has been corrected
    UpdateColor {
        name: String,
        from: String,
        to: String,
    },

    /// Label marked for deletion has been removed
    Delete { name: String },

    /// Label already matches
    NoChange { name: String },

    /// Issue re-tagged from a legacy label onto the rule's label
    Migrate { issue: u64, from: String, to: String },

    /// Legacy label deleted after its issues were migrated
    RetireLegacy { name: String, migrated: usize },

    /// Legacy label kept because search still reports issues carrying it
    LegacyRetained {
        name: String,
        migrated: usize,
        remaining: usize,
    },
}

impl ReconcileOperation {
    /// Whether this operation modifies the remote tracker
    pub fn is_change(&self) -> bool {
        !matches!(
            self,
            ReconcileOperation::NoChange { .. } | ReconcileOperation::LegacyRetained { .. }
        )
    }
}

/// Result of reconciling one rule against one repository
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub repository: String,
    pub label: String,
    pub operations: Vec<ReconcileOperation>,
    pub dry_run: bool,
}

impl RuleOutcome {
    fn new(repo: &Repository, rule: &LabelRule, dry_run: bool) -> Self {
        Self {
            repository: repo.to_string(),
            label: rule.name.clone(),
            operations: Vec::new(),
            dry_run,
        }
    }

    /// Issues moved onto the rule's label
    pub fn migrated_issues(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, ReconcileOperation::Migrate { .. }))
            .count()
    }
}

/// Whether a legacy label can be deleted after migrating its issues
///
/// `remaining` is what a fresh search reports after migrating `processed`
/// issues. An unchanged count is attributed to search-index lag. This is an
/// approximation: issues tagged with the legacy label while the migration
/// ran can go unnoticed when the counts happen to match.
pub fn legacy_label_retirable(remaining: usize, processed: usize) -> bool {
    remaining == 0 || remaining == processed
}

fn count(total: u64) -> usize {
    usize::try_from(total).unwrap_or(usize::MAX)
}

/// Label Reconciler
///
/// Applies a single [`LabelRule`] to a single repository through a [`LabelService`]
pub struct Reconciler<'a, S: ?Sized> {
    service: &'a S,
    dry_run: bool,
}

impl<'a, S: LabelService + ?Sized> Reconciler<'a, S> {
    pub fn new(service: &'a S) -> Self {
        Self {
            service,
            dry_run: false,
        }
    }

    /// Only read from the tracker, recording what would change
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Reconcile one rule against one repository
    ///
    /// # Errors
    /// Returns the first API failure. Remaining mappings of the rule are
    /// not processed after a failure.
    pub async fn reconcile(&self, repo: &Repository, rule: &LabelRule) -> Result<RuleOutcome> {
        let mut outcome = RuleOutcome::new(repo, rule, self.dry_run);
        let all_labels = self.service.list_labels(repo).await?;
        let exists = is_label_in_list(&rule.name, &all_labels);

        if rule.delete {
            if exists {
                if !self.dry_run {
                    self.service.delete_label(repo, &rule.name).await?;
                    info!(repository = %repo, "Deleted label: {}", rule.name);
                }
                outcome.operations.push(ReconcileOperation::Delete {
                    name: rule.name.clone(),
                });
            }
            return Ok(outcome);
        }

        let color = rule.normalized_color();
        if !exists {
            if !self.dry_run {
                self.service.create_label(repo, &rule.name, &color).await?;
                info!(repository = %repo, "Added label: {} (#{})", rule.name, color);
            }
            outcome.operations.push(ReconcileOperation::Create {
                name: rule.name.clone(),
                color,
            });
        } else {
            let current = self.service.get_label(repo, &rule.name).await?;
            let current_color = normalize_color(&current.color);
            if current_color != color {
                if !self.dry_run {
                    self.service.edit_label(repo, &rule.name, &color).await?;
                    info!(
                        repository = %repo,
                        "Updated color of {}: #{} -> #{}", rule.name, current_color, color
                    );
                }
                outcome.operations.push(ReconcileOperation::UpdateColor {
                    name: rule.name.clone(),
                    from: current_color,
                    to: color,
                });
            } else {
                outcome.operations.push(ReconcileOperation::NoChange {
                    name: rule.name.clone(),
                });
            }
        }

        for legacy in &rule.mappings {
            if is_label_in_list(legacy, &all_labels) {
                self.migrate(repo, &rule.name, legacy, &mut outcome).await?;
            }
        }

        Ok(outcome)
    }

    /// Move every issue from `legacy` onto `target`, then retire `legacy`
    async fn migrate(
        &self,
        repo: &Repository,
        target: &str,
        legacy: &str,
        outcome: &mut RuleOutcome,
    ) -> Result<()> {
        info!(repository = %repo, "Working on {} mapping for {}", legacy, target);
        let query = search_query(&repo.owner, &repo.name, "label", legacy);

        let found = self.service.search_issues(&query).await?;
        // More issues carry the label than one search can return
        let truncated = found.is_truncated();
        let mut processed = 0;
        for issue in &found.items {
            if !self.dry_run {
                self.service
                    .add_label_to_issue(repo, issue.number, target)
                    .await?;
                self.service
                    .remove_label_from_issue(repo, issue.number, legacy)
                    .await?;
                info!(repository = %repo, "Updated issue #{}: {} -> {}", issue.number, legacy, target);
            }
            outcome.operations.push(ReconcileOperation::Migrate {
                issue: issue.number,
                from: legacy.to_string(),
                to: target.to_string(),
            });
            processed += 1;
        }

        if self.dry_run {
            let operation = if truncated {
                ReconcileOperation::LegacyRetained {
                    name: legacy.to_string(),
                    migrated: processed,
                    remaining: count(found.total_count).saturating_sub(processed),
                }
            } else {
                ReconcileOperation::RetireLegacy {
                    name: legacy.to_string(),
                    migrated: processed,
                }
            };
            outcome.operations.push(operation);
            return Ok(());
        }

        // Check once more before deleting the label
        let remaining = count(self.service.search_issues(&query).await?.total_count);
        if truncated {
            warn!(
                repository = %repo,
                "Search reported {} issue(s) labelled {} but only {} could be fetched; \
                 rerun to migrate the rest",
                found.total_count,
                legacy,
                processed
            );
            outcome.operations.push(ReconcileOperation::LegacyRetained {
                name: legacy.to_string(),
                migrated: processed,
                remaining,
            });
        } else if legacy_label_retirable(remaining, processed) {
            self.service.delete_label(repo, legacy).await?;
            info!(repository = %repo, "Deleted label {}", legacy);
            outcome.operations.push(ReconcileOperation::RetireLegacy {
                name: legacy.to_string(),
                migrated: processed,
            });
        } else {
            warn!(
                repository = %repo,
                "Search still returns {} issue(s) labelled {}; check manually that no issue \
                 carries it, or rerun in a few minutes once the search index catches up",
                remaining,
                legacy
            );
            outcome.operations.push(ReconcileOperation::LegacyRetained {
                name: legacy.to_string(),
                migrated: processed,
                remaining,
            });
        }

        Ok(())
    }
}
