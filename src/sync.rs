//! Label Synchronization Functionality
//!
//! Driver loop applying every label rule to every configured repository

use tracing::{error, info};

use crate::config::{parse_repository, Config};
use crate::github::LabelService;
use crate::reconcile::{ReconcileOperation, Reconciler, RuleOutcome};

/// A label rule that failed for one repository
#[derive(Debug, Clone, PartialEq)]
pub struct SyncFailure {
    pub repository: String,
    pub label: String,
    pub error: String,
}

impl std::fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "label '{}' on repository {}: {}",
            self.label, self.repository, self.error
        )
    }
}

/// Synchronization result
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Outcome of every rule that reconciled, in processing order
    pub outcomes: Vec<RuleOutcome>,

    /// Number of labels created
    pub created: u32,

    /// Number of labels whose color was corrected
    pub updated: u32,

    /// Number of labels deleted on request
    pub deleted: u32,

    /// Number of issues moved off legacy labels
    pub migrated: u32,

    /// Number of legacy labels deleted after migration
    pub retired: u32,

    /// Number of legacy labels kept because search still reported issues
    pub retained: u32,

    /// Number of labels already in the desired state
    pub unchanged: u32,

    /// Whether this is a dry run
    pub dry_run: bool,

    /// Rules that failed
    pub errors: Vec<SyncFailure>,
}

impl SyncReport {
    /// Create a new empty synchronization report
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    /// Add a rule outcome and update statistics
    pub fn add_outcome(&mut self, outcome: RuleOutcome) {
        for operation in &outcome.operations {
            match operation {
                ReconcileOperation::Create { .. } => self.created += 1,
                ReconcileOperation::UpdateColor { .. } => self.updated += 1,
                ReconcileOperation::Delete { .. } => self.deleted += 1,
                ReconcileOperation::NoChange { .. } => self.unchanged += 1,
                ReconcileOperation::Migrate { .. } => self.migrated += 1,
                ReconcileOperation::RetireLegacy { .. } => self.retired += 1,
                ReconcileOperation::LegacyRetained { .. } => self.retained += 1,
            }
        }
        self.outcomes.push(outcome);
    }

    /// Add a failed rule
    pub fn add_error(&mut self, failure: SyncFailure) {
        self.errors.push(failure);
    }

    /// Whether changes occurred (or would occur, in dry-run mode)
    pub fn has_changes(&self) -> bool {
        self.outcomes
            .iter()
            .flat_map(|o| o.operations.iter())
            .any(ReconcileOperation::is_change)
    }

    /// Whether every rule reconciled without an API failure
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Label Synchronization Engine
///
/// Applies every rule of a [`Config`] to every configured repository
pub struct LabelSyncer<S> {
    service: S,
    config: Config,
    dry_run: bool,
}

impl<S: LabelService> LabelSyncer<S> {
    /// Create a new synchronization engine
    pub fn new(service: S, config: Config) -> Self {
        Self {
            service,
            config,
            dry_run: false,
        }
    }

    /// Only read from the tracker, reporting what would change
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Access the underlying service
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Synchronize labels
    ///
    /// Repositories and rules are processed sequentially, in configuration
    /// order. A failing rule is recorded and the run moves on.
    pub async fn run(&self) -> SyncReport {
        let mut report = SyncReport::new(self.dry_run);
        let reconciler = Reconciler::new(&self.service).dry_run(self.dry_run);

        for repository in &self.config.repositories {
            let repo = match parse_repository(repository) {
                Ok(repo) => repo,
                Err(e) => {
                    for rule in &self.config.labels {
                        report.add_error(SyncFailure {
                            repository: repository.clone(),
                            label: rule.name.clone(),
                            error: e.to_string(),
                        });
                    }
                    error!("Skipping repository {}: {}", repository, e);
                    continue;
                }
            };

            for rule in &self.config.labels {
                info!("Working on label '{}' for {}.", rule.name, repo);
                match reconciler.reconcile(&repo, rule).await {
                    Ok(outcome) => report.add_outcome(outcome),
                    Err(e) => {
                        let failure = SyncFailure {
                            repository: repo.to_string(),
                            label: rule.name.clone(),
                            error: e.to_string(),
                        };
                        error!("Error, {}", failure);
                        report.add_error(failure);
                    }
                }
            }
        }

        report
    }
}
