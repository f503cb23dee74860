//! Single-slot daemon cache with expiry on access.
//!
//! The slot mutex is held across the whole check / expire / relaunch
//! sequence, so concurrent callers never launch two sessions and never see
//! a half-replaced slot.

use std::sync::Arc;
use std::time::Duration;

use keepsake_common::Result;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::daemon::{Daemon, DaemonLauncher};

/// Maximum age of a daemon session before it is recycled.
pub const DEFAULT_DAEMON_TIMEOUT: Duration = Duration::from_secs(60);

struct CachedDaemon {
    handle: Arc<dyn Daemon>,
    created_at: Instant,
}

pub struct DaemonCache {
    launcher: Arc<dyn DaemonLauncher>,
    timeout: Duration,
    slot: Mutex<Option<CachedDaemon>>,
}

impl std::fmt::Debug for DaemonCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonCache")
            .field("timeout", &self.timeout)
            .field("slot", &"<daemon slot>")
            .finish()
    }
}

impl DaemonCache {
    pub fn new(launcher: Arc<dyn DaemonLauncher>, timeout: Duration) -> Self {
        Self { launcher, timeout, slot: Mutex::new(None) }
    }

    pub fn timeout(&self) -> Duration { self.timeout }

    /// Return a session created at most `timeout` ago, launching or recycling as needed.
    ///
    /// Age is measured from creation, not last use. A launch failure is
    /// returned to the caller and leaves the slot empty.
    pub async fn get(&self) -> Result<Arc<dyn Daemon>> {
        let mut slot = self.slot.lock().await;

        if let Some(cached) = slot.take() {
            if cached.created_at.elapsed() <= self.timeout {
                let handle = cached.handle.clone();
                *slot = Some(cached);
                return Ok(handle);
            }
            debug!(session_id = %cached.handle.session_id(), "Daemon session expired, recycling");
            release(cached).await;
        }

        let created_at = Instant::now();
        let handle = self.launcher.launch().await?;
        *slot = Some(CachedDaemon { handle: handle.clone(), created_at });
        Ok(handle)
    }

    /// Drop the cached session if it is still `session_id`. A session that
    /// was already replaced is left alone.
    pub async fn invalidate(&self, session_id: Uuid) {
        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|cached| cached.handle.session_id() == session_id) {
            if let Some(cached) = slot.take() {
                release(cached).await;
            }
        }
    }

    /// Clean up the current session, if any. The next `get()` launches a fresh one.
    pub async fn shutdown(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.take() {
            release(cached).await;
        }
    }
}

async fn release(cached: CachedDaemon) {
    if let Err(e) = cached.handle.cleanup().await {
        warn!(session_id = %cached.handle.session_id(), error = %e, "Daemon cleanup failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use keepsake_common::{ExperimentRecord, KeepsakeError};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug)]
    struct FakeDaemon {
        id: Uuid,
        cleanups: Arc<AtomicUsize>,
        fail_cleanup: bool,
    }

    #[async_trait]
    impl Daemon for FakeDaemon {
        fn session_id(&self) -> Uuid { self.id }
        async fn put_experiment(&self, _record: &ExperimentRecord) -> Result<()> { Ok(()) }
        async fn heartbeat(&self, _experiment_id: &str) -> Result<()> { Ok(()) }
        async fn stop_experiment(&self, _experiment_id: &str) -> Result<()> { Ok(()) }
        async fn delete_experiment(&self, _record: &ExperimentRecord) -> Result<()> { Ok(()) }
        async fn cleanup(&self) -> Result<()> {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
            if self.fail_cleanup {
                return Err(KeepsakeError::Daemon("session already gone".into()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingLauncher {
        launches: AtomicUsize,
        cleanups: Arc<AtomicUsize>,
        fail_first: AtomicUsize,
        fail_cleanup: AtomicBool,
        launch_delay: Option<Duration>,
    }

    #[async_trait]
    impl DaemonLauncher for CountingLauncher {
        async fn launch(&self) -> Result<Arc<dyn Daemon>> {
            if let Some(delay) = self.launch_delay {
                tokio::time::sleep(delay).await;
            }
            let remaining = self.fail_first.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_first.store(remaining - 1, Ordering::SeqCst);
                return Err(KeepsakeError::Daemon("repository unavailable".into()));
            }
            self.launches.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FakeDaemon {
                id: Uuid::new_v4(),
                cleanups: self.cleanups.clone(),
                fail_cleanup: self.fail_cleanup.load(Ordering::SeqCst),
            }))
        }
    }

    fn cache_with(launcher: Arc<CountingLauncher>) -> DaemonCache {
        DaemonCache::new(launcher, DEFAULT_DAEMON_TIMEOUT)
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_session_within_timeout() {
        let launcher = Arc::new(CountingLauncher::default());
        let cache = cache_with(launcher.clone());

        let first = cache.get().await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        let second = cache.get().await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        let third = cache.get().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &third));
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
        assert_eq!(launcher.cleanups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_session_cleaned_up_once_and_replaced() {
        let launcher = Arc::new(CountingLauncher::default());
        let cache = cache_with(launcher.clone());

        let first = cache.get().await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        let second = cache.get().await.unwrap();

        assert_ne!(first.session_id(), second.session_id());
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);
        assert_eq!(launcher.cleanups.load(Ordering::SeqCst), 1);

        // Use does not extend the lifetime
        tokio::time::advance(Duration::from_secs(40)).await;
        let third = cache.get().await.unwrap();
        assert!(Arc::ptr_eq(&second, &third));
        tokio::time::advance(Duration::from_secs(21)).await;
        let fourth = cache.get().await.unwrap();
        assert_ne!(third.session_id(), fourth.session_id());
        assert_eq!(launcher.cleanups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_failure_does_not_block_replacement() {
        let launcher = Arc::new(CountingLauncher::default());
        launcher.fail_cleanup.store(true, Ordering::SeqCst);
        let cache = cache_with(launcher.clone());

        let first = cache.get().await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        let second = cache.get().await.unwrap();

        assert_ne!(first.session_id(), second.session_id());
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);
        assert_eq!(launcher.cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_only_drops_matching_session() {
        let launcher = Arc::new(CountingLauncher::default());
        let cache = cache_with(launcher.clone());

        let first = cache.get().await.unwrap();
        cache.invalidate(Uuid::new_v4()).await;
        assert!(Arc::ptr_eq(&first, &cache.get().await.unwrap()));
        assert_eq!(launcher.cleanups.load(Ordering::SeqCst), 0);

        cache.invalidate(first.session_id()).await;
        assert_eq!(launcher.cleanups.load(Ordering::SeqCst), 1);
        let second = cache.get().await.unwrap();
        assert_ne!(first.session_id(), second.session_id());
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_launch_failure_propagates_and_next_call_relaunches() {
        let launcher = Arc::new(CountingLauncher::default());
        launcher.fail_first.store(1, Ordering::SeqCst);
        let cache = cache_with(launcher.clone());

        let err = cache.get().await.unwrap_err();
        assert!(matches!(err, KeepsakeError::Daemon(_)));
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);

        cache.get().await.unwrap();
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_launch_exactly_once() {
        let launcher = Arc::new(CountingLauncher {
            launch_delay: Some(Duration::from_millis(20)),
            ..Default::default()
        });
        let cache = Arc::new(cache_with(launcher.clone()));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get().await.map(|d| d.session_id()) })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap().unwrap());
        }
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
        assert!(ids.iter().all(|id| *id == ids[0]));
    }

    #[tokio::test]
    async fn test_shutdown_cleans_up_current_session() {
        let launcher = Arc::new(CountingLauncher::default());
        let cache = cache_with(launcher.clone());

        cache.shutdown().await;
        assert_eq!(launcher.cleanups.load(Ordering::SeqCst), 0);

        let first = cache.get().await.unwrap();
        cache.shutdown().await;
        assert_eq!(launcher.cleanups.load(Ordering::SeqCst), 1);

        let second = cache.get().await.unwrap();
        assert_ne!(first.session_id(), second.session_id());
    }
}
