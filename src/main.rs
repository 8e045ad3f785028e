//! `sxs-admin`: maintenance commands over one evaluation storage root.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use sxs::config::Config;
use sxs::service::EvaluationService;
use sxs::storage::{JudgmentStore, PreferencesStore, QueryStore};

/// Maintenance commands for side-by-side evaluation storage
#[derive(Debug, Parser)]
#[command(name = "sxs-admin", version, about)]
struct Cli {
    /// Storage root; overrides the configured path.
    #[arg(long, env = "SXS_STORAGE_PATH")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Summarize profiles, query sets, assessors and stored snapshots.
    Stats,
    /// Drop result snapshots no judgment cites any more.
    Compact,
    /// Delete the judgment logs of the named assessors.
    RemoveAssessor {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Print the next query the chooser would show an assessor.
    Choose {
        assessor: String,
        /// Restrict the choice to this query set.
        set: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(root) = cli.root {
        config.storage_path = root;
    }
    config.validate()?;
    let mut service = EvaluationService::open(&config)
        .with_context(|| format!("opening {}", config.storage_path.display()))?;

    match &cli.command {
        Command::Stats => stats(&service),
        Command::Compact => {
            let removed = service
                .storage()
                .judgments()
                .inner()
                .with(|store| store.inner_mut().compact_results())?;
            println!("removed {removed} orphaned snapshots");
        }
        Command::RemoveAssessor { names } => {
            let names: BTreeSet<String> = names.iter().cloned().collect();
            let removed = service
                .storage_mut()
                .judgments_mut()
                .remove_assessors(&names)?;
            if !removed {
                println!("no such assessor");
            }
        }
        Command::Choose { assessor, set } => {
            match service.next_query(assessor, set.as_deref())? {
                Some(query) => println!("{query}"),
                None => println!("no queries"),
            }
        }
    }

    tracing::debug!(command = ?cli.command, "Done");
    Ok(())
}

fn stats(service: &EvaluationService) {
    let storage = service.storage();

    let preferences = storage.preferences();
    let pair = |profile: Option<sxs::ScoringProfile>| profile.map(|p| p.name).unwrap_or_default();
    println!("root: {}", storage.root().display());
    println!(
        "profiles: {} (comparing '{}' vs '{}')",
        preferences.profiles().len(),
        pair(preferences.first_profile()),
        pair(preferences.second_profile()),
    );

    let queries = storage.queries();
    let active: BTreeSet<String> = queries.active_names().into_iter().collect();
    println!("query sets: {}", queries.names().len());
    for name in queries.names() {
        let marker = if active.contains(&name) { "*" } else { " " };
        println!(
            "  {marker} {name}: {} queries",
            queries.size(&name).unwrap_or_default()
        );
    }

    let judgments = storage.judgments();
    println!("assessors: {}", judgments.assessors().len());
    let (entries, orphans, bytes) = judgments.inner().with(|store| {
        let results = store.inner().result_store();
        (results.len(), results.orphan_count(), results.file_len())
    });
    println!("result snapshots: {entries} ({orphans} orphaned, {bytes} bytes)");
}
