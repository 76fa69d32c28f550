use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Polls a file's modification time and calls `on_change` when it moves.
pub struct ConfigWatcher {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ConfigWatcher {
    /// Start polling `path` every `interval`. A file that appears, changes or
    /// disappears counts as a change.
    pub fn spawn<F>(path: PathBuf, interval: Duration, on_change: F) -> Self
    where
        F: Fn() + Send + 'static,
    {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut last = modified(&path).await;
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            info!(path = %path.display(), interval_secs = interval.as_secs_f64(), "watching configuration file");

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        let current = modified(&path).await;
                        if current != last {
                            debug!(path = %path.display(), "configuration file changed");
                            last = current;
                            on_change();
                        }
                    }
                }
            }
        });
        Self { shutdown, task }
    }

    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

async fn modified(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn reports_modifications_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollcall.toml");
        std::fs::write(&path, "[schedule]\n").unwrap();

        let changes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&changes);
        let watcher = ConfigWatcher::spawn(path.clone(), Duration::from_millis(20), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(changes.load(Ordering::SeqCst), 0);

        let later = SystemTime::now() + Duration::from_secs(60);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(later)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(changes.load(Ordering::SeqCst), 1);

        watcher.stop().await;
    }

    #[tokio::test]
    async fn a_file_appearing_is_a_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollcall.toml");

        let changes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&changes);
        let watcher = ConfigWatcher::spawn(path.clone(), Duration::from_millis(20), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        std::fs::write(&path, "").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(changes.load(Ordering::SeqCst), 1);

        watcher.stop().await;
    }
}
