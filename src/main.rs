//! gh-label-sync CLI
//!
//! Command line tool for synchronizing labels across GitHub repositories

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use gh_label_sync::{
    config::{
        find_convention_config, load_config_from_file, parse_repository, sample_config,
        CONVENTION_CONFIG_FILES,
    },
    github::GitHubLabel,
    Config, Error, GitHubClient, LabelService, LabelSyncer, ReconcileOperation, Result,
    SyncReport,
};

/// gh-label-sync CLI
///
/// Keep label taxonomies consistent across GitHub repositories
#[derive(Parser)]
#[command(
    name = "gh-label-sync",
    version,
    about = "Synchronize GitHub labels across repositories",
    long_about = "Creates missing labels, corrects label colors, deletes deprecated labels \
    and migrates issues from legacy labels onto their replacement, for every repository \
    listed in the configuration file."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// GitHub access token
    #[arg(short = 't', long, global = true)]
    access_token: Option<String>,

    /// Target repository (owner/repo format), replaces the configured list
    #[arg(short = 'r', long = "repository", global = true)]
    repositories: Vec<String>,

    /// Dry run mode (don't make actual changes)
    #[arg(long, global = true)]
    dry_run: bool,

    /// Configuration file path (TOML/JSON/YAML)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize labels
    Sync,

    /// Preview synchronization content
    Preview,

    /// Output a sample configuration
    Init {
        /// Output format
        #[arg(long, default_value = "toml", value_parser = ["toml", "json", "yaml"])]
        format: String,

        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Display current labels of the target repositories
    List {
        /// Output format
        #[arg(long, default_value = "table", value_parser = ["table", "json", "yaml"])]
        format: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            let kind = if e.is_fatal() {
                "Configuration error"
            } else {
                "Error"
            };
            eprintln!("{} {}: {}", "✗".red(), kind, e);
            std::process::exit(1);
        }
    }
}

/// Dispatch the selected command, returning whether every rule succeeded
async fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Some(Commands::Init { format, output }) => {
            run_init(&format, output)?;
            Ok(true)
        }

        Some(Commands::List { format }) => {
            let repositories = list_targets(cli.config, &cli.repositories)?;
            let token = get_access_token(cli.access_token)?;
            run_list(&token, &repositories, &format).await?;
            Ok(true)
        }

        Some(Commands::Preview) => {
            let config = load_config(cli.config, &cli.repositories)?;
            let token = get_access_token(cli.access_token)?;
            run_sync(&token, config, true, cli.verbose).await
        }

        // Default sync mode
        Some(Commands::Sync) | None => {
            let config = load_config(cli.config, &cli.repositories)?;
            let token = get_access_token(cli.access_token)?;
            run_sync(&token, config, cli.dry_run, cli.verbose).await
        }
    }
}

/// Initialise logging: `info` by default, `debug` for this crate with `--verbose`
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "info,gh_label_sync=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stdout)
        .init();
}

/// Execute synchronization
async fn run_sync(token: &str, config: Config, dry_run: bool, verbose: bool) -> Result<bool> {
    if verbose {
        println!(
            "{} Syncing {} label rule(s) across {} repositories",
            "•".blue(),
            config.labels.len(),
            config.repositories.len()
        );
    }
    if dry_run {
        println!(
            "{} Running in dry-run mode (no changes will be made)",
            "!".yellow()
        );
    }

    let client = GitHubClient::new(token).await?;
    let syncer = LabelSyncer::new(client, config).dry_run(dry_run);
    let report = syncer.run().await;

    display_sync_report(&report, verbose);

    if verbose {
        match syncer.service().get_rate_limit().await {
            Ok(rate) => println!(
                "\n{} API quota: {}/{} remaining (resets at {})",
                "•".blue(),
                rate.remaining,
                rate.limit,
                rate.reset_at.format("%H:%M:%S UTC")
            ),
            Err(e) => tracing::debug!("Could not fetch rate limit: {}", e),
        }
    }

    if !report.is_success() {
        eprintln!("\n{} Errors occurred:", "✗".red());
        for failure in &report.errors {
            eprintln!("  {}", failure.to_string().red());
        }
    }

    Ok(report.is_success())
}

/// Execute init command
fn run_init(format: &str, output: Option<PathBuf>) -> Result<()> {
    let content = render_config(&sample_config(), format)?;

    if let Some(output_path) = output {
        std::fs::write(&output_path, content)?;
        println!(
            "{} Sample configuration written to: {}",
            "✓".green(),
            output_path.display().to_string().cyan()
        );
    } else {
        println!("{}", content);
    }

    Ok(())
}

/// Serialize a configuration in the requested format
fn render_config(config: &Config, format: &str) -> Result<String> {
    match format {
        "toml" => Ok(toml::to_string(config)?),
        "json" => Ok(serde_json::to_string_pretty(config)?),
        "yaml" => Ok(serde_yaml::to_string(config)?),
        _ => Err(Error::config_validation("Unsupported format")),
    }
}

/// Execute list command
async fn run_list(token: &str, repositories: &[String], format: &str) -> Result<()> {
    let client = GitHubClient::new(token).await?;
    let mut all_labels: BTreeMap<String, Vec<GitHubLabel>> = BTreeMap::new();

    for repository in repositories {
        let repo = parse_repository(repository)?;
        let labels = client.list_labels(&repo).await?;
        all_labels.insert(repo.to_string(), labels);
    }

    match format {
        "table" => {
            for (repository, labels) in &all_labels {
                println!("\n{}", repository.bold());
                println!("{:<30} {:<8} {:<50}", "Name".cyan(), "Color".cyan(), "Description".cyan());
                println!("{}", "─".repeat(90));

                for label in labels {
                    let description = label.description.as_deref().unwrap_or("(none)");
                    println!(
                        "{:<30} {:<8} {:<50}",
                        label.name,
                        format!("#{}", label.color),
                        description
                    );
                }
            }
        }
        "json" => println!("{}", serde_json::to_string_pretty(&all_labels)?),
        "yaml" => println!("{}", serde_yaml::to_string(&all_labels)?),
        _ => return Err(Error::config_validation("Unsupported format")),
    }

    Ok(())
}

/// Display synchronization results
fn display_sync_report(report: &SyncReport, verbose: bool) {
    if report.dry_run && report.has_changes() {
        println!("\n{} Sync preview (dry-run mode):", "•".blue());
    } else if report.has_changes() {
        println!("\n{} Sync completed:", "✓".green());
    } else {
        println!("\n{} No changes required", "✓".green());
    }

    println!("  Created:          {}", report.created.to_string().green());
    println!("  Recolored:        {}", report.updated.to_string().yellow());
    println!("  Deleted:          {}", report.deleted.to_string().red());
    println!("  Issues migrated:  {}", report.migrated.to_string().blue());
    println!("  Legacy retired:   {}", report.retired.to_string().blue());
    println!("  Legacy retained:  {}", report.retained.to_string().yellow());
    println!("  Unchanged:        {}", report.unchanged.to_string().white());

    for outcome in &report.outcomes {
        for operation in &outcome.operations {
            if let ReconcileOperation::LegacyRetained { name, remaining, .. } = operation {
                println!(
                    "\n{} {}: search still returns {} issue(s) labelled '{}'. Check manually \
                     that no issue carries it, or rerun in a few minutes.",
                    "!".yellow(),
                    outcome.repository.cyan(),
                    remaining,
                    name
                );
            }
        }
    }

    if !verbose {
        return;
    }

    println!("\n{} Detailed operations:", "•".blue());
    for outcome in &report.outcomes {
        if outcome.operations.is_empty() {
            continue;
        }
        println!("  {} / {}", outcome.repository.cyan(), outcome.label.cyan());
        for operation in &outcome.operations {
            println!("    {}", describe_operation(operation));
        }
    }
}

/// One-line description of an operation
fn describe_operation(operation: &ReconcileOperation) -> String {
    match operation {
        ReconcileOperation::Create { name, color } => {
            format!("{} Create label: {} (#{})", "+".green(), name, color)
        }
        ReconcileOperation::UpdateColor { name, from, to } => {
            format!("{} Recolor label: {} (#{} -> #{})", "~".yellow(), name, from, to)
        }
        ReconcileOperation::Delete { name } => {
            format!("{} Delete label: {}", "-".red(), name)
        }
        ReconcileOperation::NoChange { name } => {
            format!("{} No change: {}", "=".white(), name)
        }
        ReconcileOperation::Migrate { issue, from, to } => {
            format!("{} Issue #{}: {} -> {}", ">".blue(), issue, from, to)
        }
        ReconcileOperation::RetireLegacy { name, migrated } => format!(
            "{} Retire legacy label: {} ({} issue(s) migrated)",
            "-".red(),
            name,
            migrated
        ),
        ReconcileOperation::LegacyRetained {
            name,
            migrated,
            remaining,
        } => format!(
            "{} Keep legacy label: {} ({} migrated, {} still reported)",
            "!".yellow(),
            name,
            migrated,
            remaining
        ),
    }
}

/// Load, restrict and validate the configuration
fn load_config(path: Option<PathBuf>, repositories: &[String]) -> Result<Config> {
    let path = path.or_else(find_convention_config).ok_or_else(|| {
        Error::config_validation(format!(
            "No configuration file found. Use -c/--config or create one of: {}",
            CONVENTION_CONFIG_FILES.join(", ")
        ))
    })?;

    let mut config = load_config_from_file(&path)?;
    config.restrict_to(repositories);
    config.validate()?;

    if config.repositories.is_empty() {
        return Err(Error::config_validation(
            "No repositories configured. Add them to the configuration or use -r/--repository",
        ));
    }

    Ok(config)
}

/// Repositories for the list command: flags first, then the configuration
fn list_targets(path: Option<PathBuf>, repositories: &[String]) -> Result<Vec<String>> {
    if !repositories.is_empty() {
        for repo in repositories {
            parse_repository(repo)?;
        }
        return Ok(repositories.to_vec());
    }

    Ok(load_config(path, repositories)?.repositories)
}

/// Get access token
fn get_access_token(arg_token: Option<String>) -> Result<String> {
    arg_token
        .or_else(|| std::env::var("GITHUB_AUTH_TOKEN").ok())
        .or_else(|| std::env::var("GITHUB_TOKEN").ok())
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| {
            Error::config_validation(
                "GitHub access token is required. Set via --access-token, \
                 GITHUB_AUTH_TOKEN or GITHUB_TOKEN",
            )
        })
}
