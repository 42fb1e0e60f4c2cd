//! Month partition directories.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike as _, TimeZone};

use crate::StorageError;

/// Partition directory name for `now`, e.g. `"202504"`.
#[must_use]
pub fn partition_name<Tz: TimeZone>(now: &DateTime<Tz>) -> String {
    format!("{:04}{:02}", now.year(), now.month())
}

/// Partition directory for `now` under `output_root`.
#[must_use]
pub fn partition_dir<Tz: TimeZone>(output_root: &Path, now: &DateTime<Tz>) -> PathBuf {
    output_root.join(partition_name(now))
}

/// Ensures the partition for `now` exists and deletes every file in it.
///
/// Destructive. Must run exactly once per run, before any chunk is
/// written. Subdirectories are left alone.
///
/// # Errors
///
/// Returns [`StorageError::Io`] if the directory cannot be created, listed,
/// or a file in it cannot be removed.
pub fn prepare_partition<Tz: TimeZone>(
    output_root: &Path,
    now: &DateTime<Tz>,
) -> Result<PathBuf, StorageError> {
    let dir = partition_dir(output_root, now);
    log::info!("Preparing output directory {}", dir.display());

    std::fs::create_dir_all(&dir)?;

    let mut removed = 0_usize;
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            log::warn!(
                "Leaving subdirectory {} in partition",
                entry.path().display()
            );
            continue;
        }
        std::fs::remove_file(entry.path())?;
        removed += 1;
    }

    if removed > 0 {
        log::info!("Removed {removed} file(s) from {}", dir.display());
    }

    Ok(dir)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn april() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 3, 10, 0, 0).unwrap()
    }

    #[test]
    fn names_partition_by_year_and_month() {
        assert_eq!(partition_name(&april()), "202504");
        assert_eq!(
            partition_dir(Path::new("output"), &april()),
            Path::new("output").join("202504")
        );
    }

    #[test]
    fn creates_missing_partition() {
        let root = tempfile::tempdir().unwrap();
        let dir = prepare_partition(&root.path().join("nested"), &april()).unwrap();
        assert!(dir.is_dir());
        assert!(dir.ends_with("nested/202504"));
    }

    #[test]
    fn purges_existing_files_only_in_current_month() {
        let root = tempfile::tempdir().unwrap();
        let current = root.path().join("202504");
        let previous = root.path().join("202503");
        std::fs::create_dir_all(current.join("keep")).unwrap();
        std::fs::create_dir_all(&previous).unwrap();
        std::fs::write(current.join("old.parquet"), b"x").unwrap();
        std::fs::write(previous.join("march.parquet"), b"x").unwrap();

        prepare_partition(root.path(), &april()).unwrap();

        assert!(!current.join("old.parquet").exists());
        assert!(current.join("keep").is_dir());
        assert!(previous.join("march.parquet").exists());
    }
}
