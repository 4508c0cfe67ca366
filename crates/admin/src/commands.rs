//! Command execution against PostgreSQL.

use std::sync::Arc;

use anyhow::Context;
use strata_core::store::Store;
use strata_db::{PgStore, PgTransaction};
use strata_events::{Dispatcher, TracingReindexSink, UnitOfWork};
use strata_versioning::{
    install_item, CorrectionCoordinator, LocalHandleService, OwningCollectionPolicy,
    RelationshipReconciler, Removal, RestoreOutcome, VersioningConfig, VersioningCoordinator,
    WorkflowEntry,
};

use crate::cli::{Cli, Command, CorrectionCommand};

/// How a successful command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// The command was valid but there was nothing to change.
    NothingToDo,
}

/// Connect, then run one command.
pub async fn run(cli: Cli) -> anyhow::Result<Outcome> {
    let pool = strata_db::create_pool(&cli.database_url)
        .await
        .context("Failed to connect to database")?;
    strata_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::debug!("Database health check passed");

    let config = VersioningConfig::from_env().context("Invalid versioning configuration")?;
    let store = PgStore::new(pool);
    execute(store, &config, cli.command).await
}

async fn execute(
    store: PgStore,
    config: &VersioningConfig,
    command: Command,
) -> anyhow::Result<Outcome> {
    let handles = Arc::new(LocalHandleService::new(config.handle_prefix.clone()));
    let versions = VersioningCoordinator::new(store.clone(), config, handles);

    match command {
        Command::Migrate => {
            strata_db::run_migrations(store.pool())
                .await
                .context("Failed to run database migrations")?;
            tracing::info!("Database migrations applied");
            Ok(Outcome::Done)
        }

        Command::CreateVersion {
            item,
            summary,
            actor,
        } => {
            let record = versions
                .create_new_version(item, summary.as_deref(), actor)
                .await?;
            println!(
                "Created version {} (record {}) of item {item} as item {}",
                record.version_number, record.id, record.item_id
            );
            Ok(Outcome::Done)
        }

        Command::RemoveVersion { version } => match versions.remove_version(version).await? {
            Removal::NothingToDo => {
                println!("No version record {version}; nothing to do");
                Ok(Outcome::NothingToDo)
            }
            Removal::Removed {
                chain_deleted,
                reinstated,
            } => {
                println!("Removed version record {version}");
                if let Some(item_id) = reinstated {
                    println!("Item {item_id} is live again");
                }
                if chain_deleted {
                    println!("The version history was empty and has been deleted");
                }
                Ok(Outcome::Done)
            }
        },

        Command::RestoreVersion { version, summary } => {
            match versions.restore_version(version, summary.as_deref()).await? {
                RestoreOutcome::Unsupported => {
                    println!("Restoring versions is not supported; nothing changed");
                    Ok(Outcome::NothingToDo)
                }
            }
        }

        Command::Summary { version, text } => {
            let record = versions.update_summary(version, &text).await?;
            println!("Version record {} summary: {}", record.id, record.summary);
            Ok(Outcome::Done)
        }

        Command::History { item, json } => {
            let Some(chain) = versions.history_for_item(item).await? else {
                println!("Item {item} is not versioned");
                return Ok(Outcome::NothingToDo);
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&chain)?);
            } else {
                println!("History {}", chain.history_id());
                for record in chain.records() {
                    println!(
                        "  v{:<4} record {:<8} item {:<8} {}  {}",
                        record.version_number,
                        record.id,
                        record.item_id,
                        record.created_at.format("%Y-%m-%d %H:%M:%S"),
                        record.summary
                    );
                }
            }
            Ok(Outcome::Done)
        }

        Command::Install { item } => {
            let sink = Arc::new(TracingReindexSink::new());
            let dispatcher: Dispatcher<PgTransaction> = Dispatcher::new(sink.clone())
                .with_consumer(Arc::new(RelationshipReconciler::new()));
            let mut uow = UnitOfWork::new(store.begin().await?);
            install_item(&mut uow, item).await?;
            let report = dispatcher.complete(uow).await?;
            println!(
                "Installed item {item}; {} event(s) dispatched, {} item(s) flagged for reindex",
                report.events,
                sink.sent()
            );
            for stale in &report.reindexed {
                println!("  reindex item {stale}");
            }
            Ok(Outcome::Done)
        }

        Command::Correction(command) => {
            let corrections =
                CorrectionCoordinator::new(store, config, Arc::new(OwningCollectionPolicy));
            match command {
                CorrectionCommand::Begin { item, submitter } => {
                    let working = corrections.begin(item, submitter).await?;
                    println!("Working copy {} created for item {item}", working.id);
                }
                CorrectionCommand::Merge {
                    workflow_entry,
                    working,
                    native,
                } => {
                    let entry = WorkflowEntry {
                        id: workflow_entry,
                        item_id: working,
                    };
                    let outcome = corrections.merge(entry, working, native).await?;
                    println!(
                        "Merged item {working} into item {}: {} file(s) updated, {} added",
                        outcome.native_item_id,
                        outcome.updated_bitstreams.len(),
                        outcome.added_bitstreams.len()
                    );
                }
            }
            Ok(Outcome::Done)
        }
    }
}
