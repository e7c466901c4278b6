//! In-memory nonce store for replay attack prevention.
//!
//! Replay protection is per process. Several gateway instances behind one
//! load balancer each keep their own seen-set.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, Weak},
    time::Duration,
};

use tokio::{sync::oneshot, task::JoinHandle, time::Instant};

use crate::config::MAX_DURATION_SECONDS;

const MAX_DURATION: Duration = Duration::from_secs(MAX_DURATION_SECONDS);

/// Thread-safe record of recently used `(client, nonce)` pairs.
pub struct NonceStore {
    /// Map of `client_id|nonce` -> expiry time.
    seen: Mutex<HashMap<String, Instant>>,
    ttl: Duration,
}

impl NonceStore {
    /// TTLs above 30 days are clamped.
    pub fn new(ttl: Duration) -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
            ttl: ttl.min(MAX_DURATION),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Record a nonce for a client.
    ///
    /// Returns `true` if the pair is new or its previous use has expired,
    /// `false` if it is a replay within the TTL window.
    pub fn add_once(&self, client_id: &str, nonce: &str) -> bool {
        let key = format!("{client_id}|{nonce}");
        let now = Instant::now();
        let mut seen = self.lock();

        if let Some(expires_at) = seen.get(&key) {
            if now < *expires_at {
                return false;
            }
        }

        seen.insert(key, now + self.ttl);
        true
    }

    /// Remove expired entries, returning how many were purged.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut seen = self.lock();
        let before = seen.len();
        seen.retain(|_, expires_at| *expires_at > now);
        before - seen.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start the periodic sweep.
    ///
    /// The task holds a weak reference, so it ends once the store is dropped.
    /// It also ends when the returned [`NonceSweeper`] is shut down or dropped.
    /// The interval is clamped to between one second and 30 days.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> NonceSweeper {
        let interval = interval.clamp(Duration::from_secs(1), MAX_DURATION);
        let store: Weak<Self> = Arc::downgrade(self);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(store) = store.upgrade() else {
                            break;
                        };
                        let purged = store.sweep();
                        if purged > 0 {
                            tracing::debug!(purged, remaining = store.len(), "Expired nonces swept");
                        }
                    }
                    _ = &mut stop_rx => break,
                }
            }
            tracing::debug!("Nonce sweeper stopped");
        });

        NonceSweeper {
            stop: Some(stop_tx),
            handle: Some(handle),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        // Recover from mutex poisoning
        self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle to the background sweep task.
pub struct NonceSweeper {
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl NonceSweeper {
    /// Stop the sweep and wait for the task to finish.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }
}
