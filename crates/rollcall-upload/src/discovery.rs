use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local, NaiveDate};
use tracing::{debug, warn};

use crate::error::{Result, UploadError};

/// Resolve a relative directory against the working directory.
pub fn absolute_dir(directory: &Path) -> PathBuf {
    if directory.is_absolute() {
        return directory.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(directory))
        .unwrap_or_else(|_| directory.to_path_buf())
}

/// Find the CSV export for `day` in `directory`.
///
/// A `.csv` file (any case) qualifies when its modification or creation
/// time falls on `day` in local time. The most recently modified candidate
/// wins; ties keep directory order. A missing directory is `Ok(None)`.
pub async fn find_file_for_day(directory: &Path, day: NaiveDate) -> Result<Option<PathBuf>> {
    let directory = absolute_dir(directory);
    let access_error = |source| UploadError::DirectoryAccess {
        directory: directory.clone(),
        source,
    };

    let mut entries = match tokio::fs::read_dir(&directory).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(directory = %directory.display(), "CSV directory does not exist");
            return Ok(None);
        }
        Err(e) => return Err(access_error(e)),
    };

    let mut best: Option<(PathBuf, SystemTime)> = None;
    while let Some(entry) = entries.next_entry().await.map_err(access_error)? {
        let path = entry.path();
        if !has_csv_extension(&path) {
            continue;
        }
        match entry.file_type().await {
            Ok(kind) if kind.is_file() => {}
            Ok(_) => continue,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping CSV file with unreadable type");
                continue;
            }
        }

        let meta = match entry.metadata().await {
            Ok(meta) => meta,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping CSV file with unreadable stats");
                continue;
            }
        };
        let Ok(modified) = meta.modified() else {
            continue;
        };
        let created = meta.created().ok();

        let matches = local_day(modified) == day || created.is_some_and(|c| local_day(c) == day);
        debug!(file = %path.display(), matches, "CSV candidate checked");
        if !matches {
            continue;
        }

        if best.as_ref().map_or(true, |(_, t)| modified > *t) {
            best = Some((path, modified));
        }
    }

    Ok(best.map(|(path, _)| path))
}

fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

fn local_day(time: SystemTime) -> NaiveDate {
    DateTime::<Local>::from(time).date_naive()
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use chrono::{Duration, NaiveTime, TimeZone};

    use super::*;

    /// A past day, so freshly created files only match through their mtime.
    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    fn at(day: NaiveDate, h: u32, m: u32) -> SystemTime {
        let naive = day.and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap());
        Local.from_local_datetime(&naive).earliest().unwrap().into()
    }

    fn touch(dir: &Path, name: &str, modified: SystemTime) -> PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        file.set_modified(modified).unwrap();
        path
    }

    #[tokio::test]
    async fn latest_file_of_the_day_wins() {
        let dir = tempfile::tempdir().unwrap();
        let yesterday = day() - Duration::days(1);
        touch(dir.path(), "old.csv", at(yesterday, 23, 0));
        touch(dir.path(), "morning.csv", at(day(), 8, 0));
        let evening = touch(dir.path(), "evening.csv", at(day(), 17, 30));

        let found = find_file_for_day(dir.path(), day()).await.unwrap();
        assert_eq!(found, Some(evening));
    }

    #[tokio::test]
    async fn extension_is_case_insensitive_and_other_files_ignored() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "notes.txt", at(day(), 12, 0));
        touch(dir.path(), "report.csv.bak", at(day(), 12, 0));
        let upper = touch(dir.path(), "EXPORT.CSV", at(day(), 9, 0));
        std::fs::create_dir(dir.path().join("folder.csv")).unwrap();

        let found = find_file_for_day(dir.path(), day()).await.unwrap();
        assert_eq!(found, Some(upper));
    }

    #[tokio::test]
    async fn no_candidate_is_none() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "old.csv", at(day() - Duration::days(2), 9, 0));
        assert_eq!(find_file_for_day(dir.path(), day()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_directory_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not-there");
        assert_eq!(find_file_for_day(&missing, day()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn unreadable_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = touch(dir.path(), "plain.csv", at(day(), 9, 0));
        let err = find_file_for_day(&file, day()).await.unwrap_err();
        assert!(matches!(err, UploadError::DirectoryAccess { .. }));
    }

    #[tokio::test]
    async fn file_created_today_matches_today() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "fresh.csv", at(day(), 9, 0));
        let created = std::fs::metadata(&path).and_then(|m| m.created());
        // Creation time is not available on every filesystem.
        if created.is_ok() {
            let today = Local::now().date_naive();
            assert_eq!(find_file_for_day(dir.path(), today).await.unwrap(), Some(path));
        }
    }

    #[test]
    fn relative_directories_resolve_against_cwd() {
        let resolved = absolute_dir(Path::new("exports"));
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("exports"));
    }
}
