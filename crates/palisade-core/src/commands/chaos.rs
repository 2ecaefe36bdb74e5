//! Deliberate damage to the local object store, for recovery drills and
//! for validating that audit and restore actually notice.

use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use rand::{Rng, RngCore};
use tracing::warn;

use crate::error::Result;

/// How many leading bytes [`corrupt`] scrambles per object. Clobbering the
/// envelope head takes the nonce with it, the worst case for recovery.
const CORRUPT_PREFIX_LEN: usize = 50;

#[derive(Debug, Default)]
pub struct DamageReport {
    pub corrupted: u64,
    pub deleted: u64,
    pub objects: Vec<String>,
}

/// Overwrite the head of randomly selected objects with noise.
/// `rate` is the per-object probability in `[0, 1]`.
pub fn corrupt(repo_dir: &Path, rate: f64) -> Result<DamageReport> {
    let mut report = DamageReport::default();
    for (name, path) in list_objects(repo_dir)? {
        if !should_act(rate) {
            continue;
        }
        corrupt_object(&path)?;
        report.corrupted += 1;
        report.objects.push(format!("CORRUPTED: {name}"));
        warn!(object = %name, "object deliberately corrupted");
    }
    Ok(report)
}

/// Delete randomly selected objects outright.
pub fn delete(repo_dir: &Path, rate: f64) -> Result<DamageReport> {
    let mut report = DamageReport::default();
    for (name, path) in list_objects(repo_dir)? {
        if !should_act(rate) {
            continue;
        }
        std::fs::remove_file(&path)?;
        report.deleted += 1;
        report.objects.push(format!("DELETED: {name}"));
        warn!(object = %name, "object deliberately deleted");
    }
    Ok(report)
}

fn list_objects(repo_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let objects_dir = repo_dir.join("objects");
    let mut objects = Vec::new();

    for shard in std::fs::read_dir(&objects_dir)? {
        let shard = shard?;
        if !shard.file_type()?.is_dir() {
            continue;
        }
        for object in std::fs::read_dir(shard.path())? {
            let object = object?;
            if !object.file_type()?.is_file() {
                continue;
            }
            let name = object.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            objects.push((name, object.path()));
        }
    }
    Ok(objects)
}

fn should_act(rate: f64) -> bool {
    rand::thread_rng().gen_bool(rate.clamp(0.0, 1.0))
}

fn corrupt_object(path: &Path) -> Result<()> {
    let mut noise = [0u8; CORRUPT_PREFIX_LEN];
    rand::thread_rng().fill_bytes(&mut noise);

    let mut file = std::fs::OpenOptions::new().write(true).open(path)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&noise)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fs as platform_fs;

    fn seed_objects(repo: &Path, count: usize) {
        for i in 0..count {
            let shard = repo.join("objects").join(format!("{i:02x}"));
            platform_fs::create_dir_private(&shard).unwrap();
            std::fs::write(shard.join("ee".repeat(31)), vec![i as u8; 256]).unwrap();
        }
    }

    #[test]
    fn rate_zero_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        seed_objects(dir.path(), 5);

        let report = corrupt(dir.path(), 0.0).unwrap();
        assert_eq!(report.corrupted, 0);
        let report = delete(dir.path(), 0.0).unwrap();
        assert_eq!(report.deleted, 0);
    }

    #[test]
    fn rate_one_deletes_everything() {
        let dir = tempfile::tempdir().unwrap();
        seed_objects(dir.path(), 5);

        let report = delete(dir.path(), 1.0).unwrap();
        assert_eq!(report.deleted, 5);
        assert_eq!(report.objects.len(), 5);
        assert_eq!(list_objects(dir.path()).unwrap().len(), 0);
    }

    #[test]
    fn rate_one_corrupts_in_place() {
        let dir = tempfile::tempdir().unwrap();
        seed_objects(dir.path(), 3);
        let before: Vec<Vec<u8>> = list_objects(dir.path())
            .unwrap()
            .iter()
            .map(|(_, p)| std::fs::read(p).unwrap())
            .collect();

        let report = corrupt(dir.path(), 1.0).unwrap();
        assert_eq!(report.corrupted, 3);

        let after: Vec<Vec<u8>> = list_objects(dir.path())
            .unwrap()
            .iter()
            .map(|(_, p)| std::fs::read(p).unwrap())
            .collect();
        for (b, a) in before.iter().zip(&after) {
            assert_eq!(b.len(), a.len());
            assert_ne!(b, a);
        }
    }
}
