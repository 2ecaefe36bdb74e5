use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "palisade", version, about = "Deduplicating encrypted backups")]
pub struct Cli {
    /// Repository directory (index, local objects, audit log)
    #[arg(short, long, global = true, default_value = ".")]
    pub repo: String,

    /// Path to the encrypted key file
    #[arg(short, long, global = true, default_value = "palisade.key")]
    pub key_file: String,

    /// Configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Passphrase (prefer the PALISADE_PASSPHRASE environment variable)
    #[arg(long, global = true)]
    pub passphrase: Option<String>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a master key and write the encrypted key file
    Init,

    /// Back up a file or directory into a new snapshot
    Backup {
        /// Source path
        source: String,
    },

    /// List snapshots, newest first
    Snapshots,

    /// Restore a snapshot
    Restore {
        /// Snapshot id (see `snapshots`)
        snapshot_id: i64,

        /// Target directory; falls back to the config restore block
        #[arg(short, long)]
        target: Option<String>,

        /// Overwrite files that already exist at the destination
        #[arg(long)]
        force: bool,

        /// Walk and verify every chunk without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Filename globs restored first; may repeat, earlier wins
        #[arg(short, long)]
        pattern: Vec<String>,
    },

    /// Verify presence and integrity of every referenced chunk
    Audit,

    /// Verify the audit log hash chain
    VerifyLog,

    /// Run the configured backup jobs until interrupted
    Daemon,

    /// Push local objects to the configured S3 storage
    Sync {
        /// Parallel upload workers
        #[arg(long, default_value_t = palisade_core::commands::sync::DEFAULT_SYNC_WORKERS)]
        workers: usize,
    },

    /// Deliberately damage the local object store (drills)
    Chaos {
        #[command(subcommand)]
        action: ChaosAction,
    },
}

#[derive(Subcommand)]
pub enum ChaosAction {
    /// Overwrite the head of randomly chosen objects
    Corrupt {
        /// Per-object probability in [0, 1]
        #[arg(long, default_value_t = 0.1)]
        rate: f64,
    },
    /// Delete randomly chosen objects
    Delete {
        /// Per-object probability in [0, 1]
        #[arg(long, default_value_t = 0.1)]
        rate: f64,
    },
}
