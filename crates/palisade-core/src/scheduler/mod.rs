use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::auditlog::AuditLog;
use crate::commands::backup;
use crate::config::{Config, Job};
use crate::crypto::MasterKey;
use crate::error::Result;
use crate::storage::{backend_from_config, BlobBackend};

/// How often workers wake to check the shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Drives the configured backup jobs, each on its own timer.
pub struct Scheduler {
    config: Config,
    repo_dir: PathBuf,
    key: MasterKey,
}

impl Scheduler {
    pub fn new(config: Config, repo_dir: &Path, key: MasterKey) -> Self {
        Scheduler {
            config,
            repo_dir: repo_dir.to_path_buf(),
            key,
        }
    }

    /// Run until `shutdown` is set. The backend is built once and shared by
    /// every job; a backend that fails to initialize aborts the scheduler
    /// before any worker starts. Workers observe the flag within
    /// [`POLL_INTERVAL`], finish any in-flight backup, and exit; the
    /// backend is closed after all of them have joined.
    pub fn run(&self, shutdown: &AtomicBool) -> Result<()> {
        let backend = backend_from_config(self.config.storage.as_ref(), &self.repo_dir)?;
        let audit_log = AuditLog::open(&self.repo_dir);

        info!(jobs = self.config.jobs.len(), "scheduler starting");

        std::thread::scope(|s| {
            for job in &self.config.jobs {
                let backend = Arc::clone(&backend);
                let audit_log = &audit_log;
                s.spawn(move || self.run_job_loop(job, backend, audit_log, shutdown));
            }
        });

        backend.close()?;
        info!("scheduler stopped");
        Ok(())
    }

    fn run_job_loop(
        &self,
        job: &Job,
        backend: Arc<dyn BlobBackend>,
        audit_log: &AuditLog,
        shutdown: &AtomicBool,
    ) {
        let interval = match job.interval_duration() {
            Ok(interval) => interval,
            Err(e) => {
                error!(job = %job.name, error = %e, "invalid interval, job disabled");
                return;
            }
        };

        info!(job = %job.name, interval = ?interval, path = %job.path, "job scheduled");
        let mut next_run = Instant::now() + interval;

        loop {
            if shutdown.load(Ordering::SeqCst) {
                info!(job = %job.name, "job worker exiting");
                return;
            }

            if Instant::now() >= next_run {
                info!(job = %job.name, "starting scheduled backup");
                match backup::run(
                    &self.repo_dir,
                    Arc::clone(&backend),
                    &self.key,
                    Path::new(&job.path),
                    audit_log,
                    shutdown,
                ) {
                    Ok(stats) => {
                        info!(
                            job = %job.name,
                            snapshot_id = stats.snapshot_id,
                            files = stats.files,
                            "scheduled backup succeeded"
                        );
                    }
                    Err(e) => {
                        error!(job = %job.name, error = %e, "scheduled backup failed");
                    }
                }
                next_run = Instant::now() + interval;
            }

            std::thread::sleep(POLL_INTERVAL.min(interval));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;

    fn scheduler_config(source: &Path, interval: &str) -> Config {
        Config {
            jobs: vec![Job {
                name: "test-job".into(),
                path: source.to_string_lossy().into_owned(),
                interval: interval.into(),
            }],
            storage: None,
            restore: None,
        }
    }

    #[test]
    fn runs_jobs_until_shutdown() {
        let source = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("file.txt"), b"scheduled").unwrap();
        let repo = tempfile::tempdir().unwrap();

        let key = MasterKey::generate();
        let scheduler = Scheduler::new(
            scheduler_config(source.path(), "50ms"),
            repo.path(),
            key.clone(),
        );

        let shutdown = AtomicBool::new(false);
        std::thread::scope(|s| {
            let handle = s.spawn(|| scheduler.run(&shutdown));
            std::thread::sleep(Duration::from_millis(600));
            shutdown.store(true, Ordering::SeqCst);
            handle.join().unwrap().unwrap();
        });

        let index = crate::index::Index::open(repo.path(), key).unwrap();
        assert!(!index.list_snapshots().unwrap().is_empty());
    }

    #[test]
    fn invalid_interval_does_not_wedge_the_scheduler() {
        let repo = tempfile::tempdir().unwrap();
        let config = scheduler_config(repo.path(), "soon");

        let scheduler = Scheduler::new(config, repo.path(), MasterKey::generate());
        let shutdown = AtomicBool::new(false);
        // The lone job exits immediately on the parse error, so run()
        // returns without anyone setting the shutdown flag.
        scheduler.run(&shutdown).unwrap();
    }

    #[test]
    fn s3_config_with_unreachable_endpoint_fails_fast() {
        let repo = tempfile::tempdir().unwrap();
        let mut config = scheduler_config(repo.path(), "1h");
        config.storage = Some(StorageConfig {
            kind: crate::config::StorageKind::S3,
            bucket: "none".into(),
            endpoint: "127.0.0.1:1".into(),
            region: "us-east-1".into(),
            use_ssl: false,
            access_key: "x".into(),
            secret_key: "y".into(),
        });

        let scheduler = Scheduler::new(config, repo.path(), MasterKey::generate());
        let shutdown = AtomicBool::new(false);
        assert!(scheduler.run(&shutdown).is_err());
    }
}
