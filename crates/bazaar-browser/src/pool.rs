//! Health-checked session pools keyed by pool name.
//!
//! Each pool owns up to `size` sessions with stable slot indices; a slot's
//! on-disk profile survives replacement, so a relaunched session keeps the
//! cookies that cleared the challenge. Concurrent scans use distinct pool
//! names and therefore never share sessions or rate-limiting history.

use crate::error::{BrowserError, Result};
use crate::session::{SessionDriver, SessionLauncher};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

/// Health tag carried by a [`SessionHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionHealth {
    /// Session answered its last probe
    Healthy,
    /// Session failed a probe or a fetch; replaced on release
    Degraded,
    /// Session is being torn down and relaunched
    Replacing,
}

/// Exclusive reference to one pooled session.
///
/// Holding a handle holds one of the pool's permits, so at most `size`
/// fetches are ever in flight against one pool.
pub struct SessionHandle {
    driver: Box<dyn SessionDriver>,
    slot: usize,
    health: SessionHealth,
    _permit: OwnedSemaphorePermit,
}

impl SessionHandle {
    /// The underlying session.
    #[must_use]
    pub fn driver(&self) -> &dyn SessionDriver {
        self.driver.as_ref()
    }

    /// Stable slot index within the pool.
    #[must_use]
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Current health tag.
    #[must_use]
    pub fn health(&self) -> SessionHealth {
        self.health
    }

    /// Flag the session so the pool replaces it on release.
    pub fn mark_degraded(&mut self) {
        self.health = SessionHealth::Degraded;
    }
}

struct IdleSession {
    slot: usize,
    driver: Box<dyn SessionDriver>,
}

struct PoolState {
    idle: Vec<IdleSession>,
    free_slots: Vec<usize>,
}

/// A fixed-size pool of browser sessions for one scan kind.
pub struct SessionPool {
    name: String,
    size: usize,
    launcher: Arc<dyn SessionLauncher>,
    state: Mutex<PoolState>,
    permits: Arc<Semaphore>,
}

impl SessionPool {
    /// Create an empty pool; sessions launch lazily on first acquire.
    #[must_use]
    pub fn new(name: impl Into<String>, size: usize, launcher: Arc<dyn SessionLauncher>) -> Self {
        let size = size.max(1);
        Self {
            name: name.into(),
            size,
            launcher,
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                free_slots: (0..size).rev().collect(),
            }),
            permits: Arc::new(Semaphore::new(size)),
        }
    }

    /// Pool name (also the profile directory name).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured pool size.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Check out a healthy session, launching or replacing one if needed.
    ///
    /// Waits when all sessions are in flight. Idle sessions are probed with
    /// a title read before hand-out; a failed probe replaces the session in
    /// place.
    pub async fn acquire(&self) -> Result<SessionHandle> {
        self.acquire_inner(true).await
    }

    async fn acquire_inner(&self, probe: bool) -> Result<SessionHandle> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| BrowserError::SessionClosed)?;

        let idle = { self.state.lock().await.idle.pop() };
        if let Some(mut session) = idle {
            if probe {
                if let Err(e) = session.driver.title().await {
                    tracing::warn!(
                        pool = %self.name,
                        slot = session.slot,
                        "Health probe failed ({}), replacing session",
                        e
                    );
                    let _ = session.driver.close().await;
                    return self.launch_at(session.slot, permit).await;
                }
            }
            return Ok(SessionHandle {
                driver: session.driver,
                slot: session.slot,
                health: SessionHealth::Healthy,
                _permit: permit,
            });
        }

        let slot = { self.state.lock().await.free_slots.pop() };
        match slot {
            Some(slot) => self.launch_at(slot, permit).await,
            // Permit accounting guarantees idle + free >= 1 per permit held
            None => Err(BrowserError::Launch(format!(
                "pool '{}' has no free session slot",
                self.name
            ))),
        }
    }

    async fn launch_at(&self, slot: usize, permit: OwnedSemaphorePermit) -> Result<SessionHandle> {
        match self.launcher.launch(&self.name, slot).await {
            Ok(driver) => Ok(SessionHandle {
                driver,
                slot,
                health: SessionHealth::Healthy,
                _permit: permit,
            }),
            Err(e) => {
                self.state.lock().await.free_slots.push(slot);
                Err(e)
            }
        }
    }

    /// Return a session to the pool.
    ///
    /// Degraded sessions are replaced instead of re-queued; replacement
    /// failures leave the slot free for a later lazy launch.
    pub async fn release(&self, handle: SessionHandle) {
        match handle.health {
            SessionHealth::Healthy => {
                self.state.lock().await.idle.push(IdleSession {
                    slot: handle.slot,
                    driver: handle.driver,
                });
            }
            SessionHealth::Degraded | SessionHealth::Replacing => {
                if let Err(e) = self.replace(handle).await {
                    tracing::warn!(pool = %self.name, "Session replacement failed: {}", e);
                }
            }
        }
    }

    /// Tear down the handle's session and launch a fresh one in its slot.
    pub async fn replace(&self, mut handle: SessionHandle) -> Result<()> {
        handle.health = SessionHealth::Replacing;
        let _ = handle.driver.close().await;
        tracing::info!(pool = %self.name, slot = handle.slot, "Replacing session");
        match self.launcher.launch(&self.name, handle.slot).await {
            Ok(driver) => {
                self.state.lock().await.idle.push(IdleSession {
                    slot: handle.slot,
                    driver,
                });
                Ok(())
            }
            Err(e) => {
                self.state.lock().await.free_slots.push(handle.slot);
                Err(e)
            }
        }
    }

    /// Replace one session without probing it first.
    ///
    /// Used by the escalation policy, which already knows fetches through
    /// this pool keep failing.
    pub async fn replace_one(&self) -> Result<()> {
        let handle = self.acquire_inner(false).await?;
        self.replace(handle).await
    }

    /// Tear down every session after a cooldown sleep.
    ///
    /// Blocks until no fetch is in flight, then closes all sessions; slots
    /// relaunch lazily on the next acquire.
    pub async fn restart(&self, cooldown: Duration) -> Result<()> {
        tracing::warn!(pool = %self.name, "Restarting session pool after {:?} cooldown", cooldown);
        let _all = self
            .permits
            .clone()
            .acquire_many_owned(u32::try_from(self.size).unwrap_or(u32::MAX))
            .await
            .map_err(|_| BrowserError::SessionClosed)?;
        tokio::time::sleep(cooldown).await;

        let mut state = self.state.lock().await;
        let sessions: Vec<IdleSession> = state.idle.drain(..).collect();
        for mut session in sessions {
            let _ = session.driver.close().await;
            state.free_slots.push(session.slot);
        }
        Ok(())
    }
}

/// Registry of session pools keyed by pool name.
///
/// Injected into the scan engine; pools are created on first use under the
/// registry lock, so concurrent scans never double-create a pool.
pub struct PoolRegistry {
    launcher: Arc<dyn SessionLauncher>,
    pools: Mutex<HashMap<String, Arc<SessionPool>>>,
}

impl PoolRegistry {
    /// Create a registry backed by the given launcher.
    #[must_use]
    pub fn new(launcher: Arc<dyn SessionLauncher>) -> Self {
        Self {
            launcher,
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// Get or lazily create the pool for `name`.
    ///
    /// `size` only applies on first creation; later calls return the
    /// existing pool unchanged.
    pub async fn pool(&self, name: &str, size: usize) -> Arc<SessionPool> {
        let mut pools = self.pools.lock().await;
        pools
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(SessionPool::new(name, size, Arc::clone(&self.launcher)))
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeDriver {
        fail_probe: bool,
    }

    #[async_trait::async_trait]
    impl SessionDriver for FakeDriver {
        async fn goto(&self, _url: &str) -> Result<()> {
            Ok(())
        }

        async fn content(&self) -> Result<String> {
            Ok("<html></html>".to_string())
        }

        async fn title(&self) -> Result<String> {
            if self.fail_probe {
                Err(BrowserError::HealthProbe("no response".to_string()))
            } else {
                Ok("Trade Hub".to_string())
            }
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct FakeLauncher {
        launches: AtomicUsize,
        fail_probe_first: AtomicUsize,
    }

    impl FakeLauncher {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                launches: AtomicUsize::new(0),
                fail_probe_first: AtomicUsize::new(0),
            })
        }

        fn launch_count(&self) -> usize {
            self.launches.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl SessionLauncher for FakeLauncher {
        async fn launch(&self, _pool: &str, _slot: usize) -> Result<Box<dyn SessionDriver>> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            let fail_probe = self
                .fail_probe_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            Ok(Box::new(FakeDriver { fail_probe }))
        }
    }

    #[tokio::test]
    async fn test_acquire_release_reuses_session() {
        let launcher = FakeLauncher::new();
        let pool = SessionPool::new("history", 2, launcher.clone());

        let handle = pool.acquire().await.expect("acquire");
        assert_eq!(handle.health(), SessionHealth::Healthy);
        pool.release(handle).await;

        let _again = pool.acquire().await.expect("acquire again");
        assert_eq!(launcher.launch_count(), 1);
    }

    #[tokio::test]
    async fn test_pool_caps_in_flight_sessions() {
        let launcher = FakeLauncher::new();
        let pool = Arc::new(SessionPool::new("current", 2, launcher.clone()));

        let a = pool.acquire().await.expect("first");
        let _b = pool.acquire().await.expect("second");

        let blocked = tokio::time::timeout(Duration::from_millis(50), pool.acquire()).await;
        assert!(blocked.is_err(), "third acquire should wait for a release");

        pool.release(a).await;
        let _c = pool.acquire().await.expect("after release");
        assert_eq!(launcher.launch_count(), 2);
    }

    #[tokio::test]
    async fn test_degraded_handle_is_replaced_on_release() {
        let launcher = FakeLauncher::new();
        let pool = SessionPool::new("current", 1, launcher.clone());

        let mut handle = pool.acquire().await.expect("acquire");
        handle.mark_degraded();
        pool.release(handle).await;
        assert_eq!(launcher.launch_count(), 2);

        let handle = pool.acquire().await.expect("reacquire");
        assert_eq!(handle.health(), SessionHealth::Healthy);
        assert_eq!(launcher.launch_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_probe_triggers_in_place_replacement() {
        let launcher = FakeLauncher::new();
        launcher.fail_probe_first.store(1, Ordering::SeqCst);
        let pool = SessionPool::new("current", 1, launcher.clone());

        // First launch produces a session whose probe fails
        let handle = pool.acquire().await.expect("acquire");
        pool.release(handle).await;

        let handle = pool.acquire().await.expect("acquire with probe");
        assert_eq!(handle.health(), SessionHealth::Healthy);
        assert_eq!(launcher.launch_count(), 2);
    }

    #[tokio::test]
    async fn test_replace_one_swaps_a_session() {
        let launcher = FakeLauncher::new();
        let pool = SessionPool::new("history", 1, launcher.clone());

        let handle = pool.acquire().await.expect("acquire");
        pool.release(handle).await;

        pool.replace_one().await.expect("replace");
        assert_eq!(launcher.launch_count(), 2);

        // The replacement is idle and reusable
        let _handle = pool.acquire().await.expect("reacquire");
        assert_eq!(launcher.launch_count(), 2);
    }

    #[tokio::test]
    async fn test_restart_closes_all_and_relaunches_lazily() {
        let launcher = FakeLauncher::new();
        let pool = SessionPool::new("history", 2, launcher.clone());

        let a = pool.acquire().await.expect("a");
        let b = pool.acquire().await.expect("b");
        pool.release(a).await;
        pool.release(b).await;
        assert_eq!(launcher.launch_count(), 2);

        pool.restart(Duration::from_millis(1)).await.expect("restart");

        let _a = pool.acquire().await.expect("after restart");
        assert_eq!(launcher.launch_count(), 3);
    }

    #[tokio::test]
    async fn test_registry_returns_one_pool_per_name() {
        let launcher = FakeLauncher::new();
        let registry = PoolRegistry::new(launcher);

        let first = registry.pool("current_auctions", 2).await;
        let second = registry.pool("current_auctions", 4).await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.size(), 2);

        let other = registry.pool("auction_history", 2).await;
        assert!(!Arc::ptr_eq(&first, &other));
    }
}
