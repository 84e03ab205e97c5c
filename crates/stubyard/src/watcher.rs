//! Data file watcher.
//!
//! Polls the modification time of the data file and of every file the last
//! successful load read. Each file is stamped just before the loader reads
//! it, so an edit that lands during a load still differs on the next tick.
//! When any stamp changes the whole data file is loaded again; the
//! repository is only touched if that load succeeds.

use crate::repository::StubRepository;
use crate::resource::FileStamps;
use crate::yaml::{LoadError, StubLoader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_millis(100);

/// A data file published as a new generation.
#[derive(Debug, Clone)]
pub struct Reloaded {
    pub generation: u64,
    /// Stamps of every file the load read, taken before reading it.
    pub stamps: FileStamps,
}

/// Load `data_file` and publish it as a new generation.
///
/// On error the repository keeps its current snapshot.
pub fn reload_data_file(
    loader: &StubLoader,
    repository: &StubRepository,
    data_file: &Path,
) -> Result<Reloaded, LoadError> {
    let loaded = loader.load_file_stamped(data_file)?;
    let generation = repository.reload(loaded.records);
    Ok(Reloaded {
        generation,
        stamps: loaded.stamps,
    })
}

/// Periodic reload task for one data file.
pub struct ReloadWatcher {
    data_file: PathBuf,
    interval: Duration,
    loader: StubLoader,
    repository: Arc<StubRepository>,
    baseline: FileStamps,
}

impl ReloadWatcher {
    /// `baseline` is the stamps of the load that produced the active
    /// snapshot, so edits made between that load and the first poll are seen.
    pub fn new(
        data_file: impl Into<PathBuf>,
        interval: Duration,
        loader: StubLoader,
        repository: Arc<StubRepository>,
        baseline: FileStamps,
    ) -> Self {
        Self {
            data_file: data_file.into(),
            interval,
            loader,
            repository,
            baseline,
        }
    }

    /// Start polling on the current runtime until `cancel` fires.
    pub fn spawn(mut self, cancel: CancellationToken) -> WatcherHandle {
        let baseline = std::mem::take(&mut self.baseline);
        let token = cancel.clone();
        let task = tokio::spawn(Arc::new(self).run(baseline, token));
        WatcherHandle { cancel, task }
    }

    async fn run(self: Arc<Self>, mut baseline: FileStamps, cancel: CancellationToken) {
        info!(
            "Watching {} for changes every {:?}",
            self.data_file.display(),
            self.interval
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Watcher for {} stopped", self.data_file.display());
                    break;
                }
                _ = ticker.tick() => {
                    // Stats and reloads touch the filesystem
                    let watcher = Arc::clone(&self);
                    let previous = baseline.clone();
                    match tokio::task::spawn_blocking(move || watcher.poll(previous)).await {
                        Ok(next) => baseline = next,
                        Err(e) => error!("Watcher poll for {} failed: {}", self.data_file.display(), e),
                    }
                }
            }
        }
    }

    /// Reload if any stamp in `baseline` changed. Returns the baseline for
    /// the next tick.
    fn poll(&self, baseline: FileStamps) -> FileStamps {
        let current = baseline.restat(self.loader.reader().as_ref());
        if current == baseline {
            return baseline;
        }

        info!("Change detected in {}, reloading", self.data_file.display());
        match reload_data_file(&self.loader, &self.repository, &self.data_file) {
            Ok(reloaded) => {
                info!(
                    "Reloaded {} as generation {}",
                    self.data_file.display(),
                    reloaded.generation
                );
                reloaded.stamps
            }
            Err(e) => {
                error!(
                    "Failed to reload {}, keeping previous stubs: {}",
                    self.data_file.display(),
                    e
                );
                // Stamps taken before the attempt, so a later edit still differs
                current
            }
        }
    }
}

/// Handle to a running watcher.
#[derive(Debug)]
pub struct WatcherHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl WatcherHandle {
    /// Signal the watcher to stop and wait for it to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!("Watcher task failed: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::request::IncomingRequest;
    use crate::resource::{MemoryReader, ResourceReader};
    use parking_lot::Mutex;
    use std::io;
    use std::time::{SystemTime, UNIX_EPOCH};

    const DATA: &str = "/stubs/data.yaml";

    fn stub(body: &str) -> String {
        format!("- request:\n    url: /w\n  response:\n    status: 200\n    body: {body}\n")
    }

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn setup() -> (Arc<MemoryReader>, StubLoader, Arc<StubRepository>, FileStamps) {
        let reader = Arc::new(MemoryReader::new());
        reader.insert_at(DATA, stub("one"), at(1));
        let loader = StubLoader::for_data_file(Path::new(DATA), reader.clone());
        let repository = Arc::new(StubRepository::new(CacheConfig::default()));
        let stamps = reload_data_file(&loader, &repository, Path::new(DATA))
            .unwrap()
            .stamps;
        (reader, loader, repository, stamps)
    }

    fn watch(
        loader: StubLoader,
        repository: &Arc<StubRepository>,
        stamps: FileStamps,
    ) -> WatcherHandle {
        ReloadWatcher::new(
            DATA,
            Duration::from_millis(10),
            loader,
            Arc::clone(repository),
            stamps,
        )
        .spawn(CancellationToken::new())
    }

    fn body(repository: &StubRepository) -> Vec<u8> {
        let found = repository.find(&IncomingRequest::new("GET", "/w")).unwrap();
        found.record().responses().get(0).unwrap().body().to_vec()
    }

    async fn wait_for_generation(repository: &StubRepository, generation: u64) -> bool {
        for _ in 0..100 {
            if repository.current_snapshot().generation() >= generation {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    /// Saves a pending edit to the data file right after it has been read,
    /// like an editor writing while a reload is in progress.
    struct RacingReader {
        inner: MemoryReader,
        pending: Mutex<Option<(String, SystemTime)>>,
    }

    impl ResourceReader for RacingReader {
        fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
            let contents = self.inner.read(path)?;
            if path == Path::new(DATA) {
                if let Some((text, modified)) = self.pending.lock().take() {
                    self.inner.insert_at(DATA, text, modified);
                }
            }
            Ok(contents)
        }

        fn modified(&self, path: &Path) -> io::Result<SystemTime> {
            self.inner.modified(path)
        }
    }

    #[tokio::test]
    async fn test_change_triggers_reload() {
        let (reader, loader, repository, stamps) = setup();
        let handle = watch(loader, &repository, stamps);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(repository.current_snapshot().generation(), 1);

        reader.insert_at(DATA, stub("two"), at(2));
        assert!(wait_for_generation(&repository, 2).await);
        assert_eq!(body(&repository), b"two");

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_change_before_watcher_starts_is_seen() {
        let (reader, loader, repository, stamps) = setup();
        reader.insert_at(DATA, stub("two"), at(2));

        let handle = watch(loader, &repository, stamps);
        assert!(wait_for_generation(&repository, 2).await);
        assert_eq!(body(&repository), b"two");

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_referenced_file_change_triggers_reload() {
        let reader = Arc::new(MemoryReader::new());
        reader.insert_at("/stubs/body.txt", "first", at(1));
        reader.insert_at(
            DATA,
            "- request:\n    url: /w\n  response:\n    status: 200\n    file: body.txt\n",
            at(1),
        );
        let loader = StubLoader::for_data_file(Path::new(DATA), reader.clone());
        let repository = Arc::new(StubRepository::new(CacheConfig::default()));
        let stamps = reload_data_file(&loader, &repository, Path::new(DATA))
            .unwrap()
            .stamps;

        let handle = watch(loader, &repository, stamps);

        reader.insert_at("/stubs/body.txt", "second", at(2));
        assert!(wait_for_generation(&repository, 2).await);
        assert_eq!(body(&repository), b"second");

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_edit_during_reload_is_not_lost() {
        let reader = Arc::new(RacingReader {
            inner: MemoryReader::new(),
            pending: Mutex::new(None),
        });
        reader.inner.insert_at(DATA, stub("one"), at(1));
        let loader = StubLoader::for_data_file(Path::new(DATA), reader.clone());
        let repository = Arc::new(StubRepository::new(CacheConfig::default()));
        let stamps = reload_data_file(&loader, &repository, Path::new(DATA))
            .unwrap()
            .stamps;

        let handle = watch(loader, &repository, stamps);

        *reader.pending.lock() = Some((stub("three"), at(3)));
        reader.inner.insert_at(DATA, stub("two"), at(2));

        assert!(wait_for_generation(&repository, 3).await);
        assert_eq!(body(&repository), b"three");

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_last_good_snapshot() {
        let (reader, loader, repository, stamps) = setup();
        let handle = watch(loader, &repository, stamps);

        reader.insert_at(DATA, "- request: [not, valid", at(2));
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(repository.current_snapshot().generation(), 1);
        assert_eq!(body(&repository), b"one");

        // Recovers on the next good write
        reader.insert_at(DATA, stub("three"), at(3));
        assert!(wait_for_generation(&repository, 2).await);
        assert_eq!(body(&repository), b"three");

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_stop_ends_task() {
        let (_reader, loader, repository, stamps) = setup();
        let cancel = CancellationToken::new();
        let handle = ReloadWatcher::new(DATA, Duration::from_millis(10), loader, repository, stamps)
            .spawn(cancel.clone());

        assert!(!handle.is_finished());
        handle.stop().await;
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_reload_data_file_reports_errors() {
        let reader = Arc::new(MemoryReader::new());
        let loader = StubLoader::for_data_file(Path::new(DATA), reader);
        let repository = StubRepository::new(CacheConfig::default());

        let err = reload_data_file(&loader, &repository, Path::new(DATA)).unwrap_err();
        assert!(matches!(err, LoadError::FileNotFound { .. }));
        assert_eq!(repository.current_snapshot().generation(), 0);
    }

    #[test]
    fn test_reload_data_file_returns_stamps() {
        let (_reader, _loader, repository, stamps) = setup();
        assert_eq!(repository.current_snapshot().generation(), 1);
        assert_eq!(stamps.get(Path::new(DATA)), Some(Some(at(1))));
    }
}
