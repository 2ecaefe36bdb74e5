mod cli;
mod signal;

use std::path::{Path, PathBuf};

use clap::Parser;

use palisade_core::auditlog::AuditLog;
use palisade_core::commands::{audit, backup, chaos, restore, sync};
use palisade_core::config::{self, Config, StorageKind};
use palisade_core::crypto::{keyfile, MasterKey};
use palisade_core::error::{PalisadeError, Result};
use palisade_core::scheduler::Scheduler;
use palisade_core::storage::s3_backend::S3Backend;
use palisade_core::storage::{backend_from_config, BlobBackend};

use crate::cli::{ChaosAction, Cli, Commands};
use crate::signal::SHUTDOWN;

const PASSPHRASE_ENV: &str = "PALISADE_PASSPHRASE";

fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    signal::install_signal_handlers();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let repo_dir = PathBuf::from(&cli.repo);
    let key_file = PathBuf::from(&cli.key_file);
    let cfg = cli.config.as_deref().map(|p| config::load(Path::new(p))).transpose()?;
    if let Some(path) = cli.config.as_deref() {
        tracing::info!(config = path, "configuration loaded");
    }

    match cli.command {
        Commands::Init => {
            if key_file.exists() {
                return Err(PalisadeError::Config(format!(
                    "key file already exists: {}",
                    key_file.display()
                )));
            }
            let passphrase = passphrase(&cli.passphrase)?;
            let key = MasterKey::generate();
            keyfile::save(&key_file, &key, &passphrase)?;
            std::fs::create_dir_all(&repo_dir)?;
            AuditLog::open(&repo_dir).log_action("INIT", "repository key created")?;
            println!("Key file written to {}", key_file.display());
            println!("Keep the passphrase safe; without it every backup is unreadable.");
            Ok(())
        }

        Commands::Backup { source } => {
            let key = load_key(&key_file, &cli.passphrase)?;
            let backend = configured_backend(cfg.as_ref(), &repo_dir)?;
            let audit_log = AuditLog::open(&repo_dir);

            let stats = backup::run(
                &repo_dir,
                backend,
                &key,
                Path::new(&source),
                &audit_log,
                &SHUTDOWN,
            )?;
            println!(
                "Snapshot {} complete: {} files, {} bytes ({} skipped)",
                stats.snapshot_id, stats.files, stats.bytes, stats.skipped
            );
            Ok(())
        }

        Commands::Snapshots => {
            let key = load_key(&key_file, &cli.passphrase)?;
            let index = palisade_core::index::Index::open(&repo_dir, key)?;
            let snapshots = index.list_snapshots()?;
            if snapshots.is_empty() {
                println!("No snapshots.");
                return Ok(());
            }
            for snapshot in snapshots {
                println!(
                    "{:>6}  {}  {}",
                    snapshot.id,
                    snapshot.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    snapshot.description
                );
            }
            Ok(())
        }

        Commands::Restore {
            snapshot_id,
            target,
            force,
            dry_run,
            pattern,
        } => {
            let key = load_key(&key_file, &cli.passphrase)?;
            let restore_cfg = cfg.as_ref().and_then(|c| c.restore.as_ref());

            let target = target
                .or_else(|| restore_cfg.map(|r| r.target_dir.clone()))
                .ok_or_else(|| {
                    PalisadeError::Config(
                        "no restore target: pass --target or set restore.target_dir".into(),
                    )
                })?;
            let priority_patterns = if pattern.is_empty() {
                restore_cfg
                    .map(|r| r.priority_patterns.clone())
                    .unwrap_or_default()
            } else {
                pattern
            };

            let backend = configured_backend(cfg.as_ref(), &repo_dir)?;
            let index = palisade_core::index::Index::open(&repo_dir, key.clone())?;
            let store = palisade_core::storage::object_store::ObjectStore::new(backend, key);
            let audit_log = AuditLog::open(&repo_dir);
            audit_log.log_action("RESTORE_START", &format!("snapshot {snapshot_id}"))?;

            let stats = restore::run(
                &index,
                &store,
                snapshot_id,
                Path::new(&target),
                &restore::RestoreOptions {
                    force,
                    dry_run,
                    priority_patterns,
                },
                &SHUTDOWN,
            )?;
            println!(
                "Restored {} files ({} bytes){}",
                stats.files,
                stats.bytes,
                if dry_run { " [dry run]" } else { "" }
            );
            Ok(())
        }

        Commands::Audit => {
            let key = load_key(&key_file, &cli.passphrase)?;
            let backend = configured_backend(cfg.as_ref(), &repo_dir)?;
            let index = palisade_core::index::Index::open(&repo_dir, key.clone())?;
            let store = palisade_core::storage::object_store::ObjectStore::new(backend, key);
            let audit_log = AuditLog::open(&repo_dir);

            let report = audit::run(&index, &store, &SHUTDOWN)?;
            audit_log.log_action(
                "AUDIT",
                &format!(
                    "chunks={} missing={} corrupt={}",
                    report.total_chunks, report.missing_chunks, report.corrupt_chunks
                ),
            )?;

            println!("Files:          {}", report.total_files);
            println!("Unique chunks:  {}", report.total_chunks);
            println!("Missing:        {}", report.missing_chunks);
            println!("Corrupt:        {}", report.corrupt_chunks);
            println!("Health score:   {}", report.score);
            if !report.healthy {
                eprintln!("Repository is UNHEALTHY");
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::VerifyLog => {
            let entries = AuditLog::open(&repo_dir).verify()?;
            println!("Audit log OK ({entries} entries)");
            Ok(())
        }

        Commands::Daemon => {
            let cfg = cfg.ok_or_else(|| {
                PalisadeError::Config("daemon mode requires --config".into())
            })?;
            if cfg.jobs.is_empty() {
                return Err(PalisadeError::Config("no jobs configured".into()));
            }
            let key = load_key(&key_file, &cli.passphrase)?;
            println!("Starting daemon with {} jobs (Ctrl-C to stop)", cfg.jobs.len());
            Scheduler::new(cfg, &repo_dir, key).run(&SHUTDOWN)
        }

        Commands::Sync { workers } => {
            let cfg = cfg.ok_or_else(|| PalisadeError::Config("sync requires --config".into()))?;
            let storage = cfg.storage.as_ref().filter(|s| s.kind == StorageKind::S3);
            let storage = storage.ok_or_else(|| {
                PalisadeError::Config("sync requires an s3 storage block in the config".into())
            })?;

            let dest: std::sync::Arc<dyn BlobBackend> =
                std::sync::Arc::new(S3Backend::from_config(storage)?);
            let stats = sync::run(&repo_dir, &dest, workers)?;
            println!(
                "Synced {} objects ({} already present, {} failed)",
                stats.uploaded, stats.skipped, stats.failed
            );
            Ok(())
        }

        Commands::Chaos { action } => {
            let report = match action {
                ChaosAction::Corrupt { rate } => chaos::corrupt(&repo_dir, rate)?,
                ChaosAction::Delete { rate } => chaos::delete(&repo_dir, rate)?,
            };
            for line in &report.objects {
                println!("{line}");
            }
            println!(
                "Damage report: {} corrupted, {} deleted",
                report.corrupted, report.deleted
            );
            Ok(())
        }
    }
}

fn passphrase(flag: &Option<String>) -> Result<String> {
    if let Some(p) = flag {
        return Ok(p.clone());
    }
    std::env::var(PASSPHRASE_ENV).map_err(|_| {
        PalisadeError::Config(format!(
            "no passphrase: pass --passphrase or set {PASSPHRASE_ENV}"
        ))
    })
}

fn load_key(key_file: &Path, flag: &Option<String>) -> Result<MasterKey> {
    keyfile::load(key_file, &passphrase(flag)?)
}

fn configured_backend(
    cfg: Option<&Config>,
    repo_dir: &Path,
) -> Result<std::sync::Arc<dyn BlobBackend>> {
    backend_from_config(cfg.and_then(|c| c.storage.as_ref()), repo_dir)
}
