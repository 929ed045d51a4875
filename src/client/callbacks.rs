use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::{log_debug, log_warn, CorrelationId, Packet};

/// One-shot handler stored for an outstanding correlated request.
pub(crate) type CallbackHandler = Box<dyn FnOnce(Packet) + Send>;

struct Entry {
    // ---
    handler: CallbackHandler,
    created: Instant,
}

struct RegistryInner {
    // ---
    entries: HashMap<CorrelationId, Entry>,
    last_sweep: Instant,
}

/// Registry of outstanding callbacks, keyed by correlation ID.
///
/// Entries are inserted before the corresponding request is sent (so a fast
/// response can never race past registration) and removed exactly once:
/// either on a successful match, or by the expiry sweep if no response ever
/// arrives.
///
/// All operations serialize on one internal mutex. The lock is never held
/// while a handler runs; `resolve` hands the handler out and the caller
/// invokes it outside the lock.
///
/// Sweeping piggy-backs on registration calls, throttled to at most once per
/// sweep interval, so no background timer task is needed. The cost is
/// unbounded growth while no new registrations happen, which is acceptable
/// for a client that periodically issues requests.
pub(crate) struct CallbackRegistry {
    // ---
    inner: Mutex<RegistryInner>,
    lifetime: Duration,
    sweep_interval: Duration,
}

/// Acquire a mutex guard, intentionally ignoring poisoning.
///
/// The protected state is a best-effort pending-callback map; there are no
/// invariants spanning multiple fields, and the worst outcome of continuing
/// past a poisoned lock is a dropped or unmatched response.
fn lock_ignore_poison<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // ---
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl CallbackRegistry {
    // ---
    pub fn new(lifetime: Duration, sweep_interval: Duration) -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            lifetime,
            sweep_interval,
        }
    }

    /// Insert a new entry stamped with the current time.
    ///
    /// Opportunistically sweeps expired entries first if the throttle
    /// interval has elapsed. Registering an ID that is already outstanding
    /// is a programming error; callers generate fresh IDs via
    /// [`contains`](Self::contains) checks.
    pub fn register(&self, id: CorrelationId, handler: CallbackHandler) {
        // ---
        let now = Instant::now();
        let mut inner = lock_ignore_poison(&self.inner);

        if now.duration_since(inner.last_sweep) >= self.sweep_interval {
            Self::sweep_locked(&mut inner, now, self.lifetime);
            inner.last_sweep = now;
        }

        let prev = inner.entries.insert(
            id,
            Entry {
                handler,
                created: now,
            },
        );

        debug_assert!(prev.is_none(), "correlation id {id} registered twice");
        if prev.is_some() {
            log_warn!("correlation id {id} was already outstanding; old callback discarded");
        }
    }

    /// Atomically remove and return the handler for `id`.
    ///
    /// `None` means no waiter: a late arrival after a sweep, a duplicate
    /// delivery, or a response to a fire-and-forget send. Callers drop the
    /// packet silently in that case.
    pub fn resolve(&self, id: CorrelationId) -> Option<CallbackHandler> {
        // ---
        let entry = {
            let mut inner = lock_ignore_poison(&self.inner);
            inner.entries.remove(&id)
        };

        if entry.is_none() {
            log_debug!("no outstanding callback for correlation id {id}");
        }

        entry.map(|e| e.handler)
    }

    /// Whether `id` is currently outstanding.
    pub fn contains(&self, id: CorrelationId) -> bool {
        // ---
        lock_ignore_poison(&self.inner).entries.contains_key(&id)
    }

    /// Number of outstanding entries.
    pub fn len(&self) -> usize {
        // ---
        lock_ignore_poison(&self.inner).entries.len()
    }

    /// Remove every entry older than the configured lifetime, as of `now`.
    ///
    /// The scan visits every entry regardless of insertion order: after
    /// partial removals, expiry order and insertion order diverge, so
    /// truncating a trailing range would be wrong.
    pub fn sweep_at(&self, now: Instant) {
        // ---
        let mut inner = lock_ignore_poison(&self.inner);
        Self::sweep_locked(&mut inner, now, self.lifetime);
        inner.last_sweep = now;
    }

    fn sweep_locked(inner: &mut RegistryInner, now: Instant, lifetime: Duration) {
        // ---
        let before = inner.entries.len();

        inner
            .entries
            .retain(|_, entry| now.duration_since(entry.created) < lifetime);

        let swept = before - inner.entries.len();
        if swept > 0 {
            log_debug!("swept {swept} expired callback registration(s)");
        }
    }

    /// Test hook: insert an entry with an explicit creation time.
    #[cfg(test)]
    fn register_at(&self, id: CorrelationId, handler: CallbackHandler, created: Instant) {
        // ---
        let mut inner = lock_ignore_poison(&self.inner);
        inner.entries.insert(id, Entry { handler, created });
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn noop() -> CallbackHandler {
        Box::new(|_| {})
    }

    fn registry() -> CallbackRegistry {
        CallbackRegistry::new(Duration::from_secs(300), Duration::from_secs(60))
    }

    #[test]
    fn test_resolve_at_most_once() {
        // ---
        let reg = registry();
        let id = CorrelationId::from(1);

        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        reg.register(
            id,
            Box::new(move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let handler = reg.resolve(id).expect("registered handler");
        handler(Packet::plain(crate::PacketTypeId(0), bytes::Bytes::new()));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Second resolve finds nothing; the same handler can never fire twice.
        assert!(reg.resolve(id).is_none());
    }

    #[test]
    fn test_sweep_is_scan_based() {
        // ---
        let reg = registry();
        let now = Instant::now();

        // Creation times deliberately out of insertion order: the entry
        // inserted second is the oldest.
        reg.register_at(CorrelationId::from(1), noop(), now + Duration::from_secs(120));
        reg.register_at(CorrelationId::from(2), noop(), now);
        reg.register_at(CorrelationId::from(3), noop(), now + Duration::from_secs(240));

        // At now + 5m30s only entry 2 has exceeded the 5 minute lifetime.
        reg.sweep_at(now + Duration::from_secs(330));

        assert!(reg.contains(CorrelationId::from(1)));
        assert!(!reg.contains(CorrelationId::from(2)));
        assert!(reg.contains(CorrelationId::from(3)));
    }

    #[test]
    fn test_sweep_survivors_after_partial_removal() {
        // ---
        let reg = registry();
        let now = Instant::now();

        reg.register_at(CorrelationId::from(1), noop(), now);
        reg.register_at(CorrelationId::from(2), noop(), now + Duration::from_secs(200));
        assert!(reg.resolve(CorrelationId::from(1)).is_some());

        reg.sweep_at(now + Duration::from_secs(330));
        assert!(reg.contains(CorrelationId::from(2)));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_register_piggybacks_sweep() {
        // ---
        // Zero lifetime and zero throttle: every registration sweeps first,
        // so the previous entry is gone by the time the next one lands.
        let reg = CallbackRegistry::new(Duration::ZERO, Duration::ZERO);

        reg.register(CorrelationId::from(1), noop());
        reg.register(CorrelationId::from(2), noop());

        assert!(!reg.contains(CorrelationId::from(1)));
        assert!(reg.contains(CorrelationId::from(2)));
    }

    #[test]
    fn test_sweep_throttled_by_interval() {
        // ---
        // Long throttle: registration must NOT sweep even though the
        // existing entry is expired.
        let reg = CallbackRegistry::new(Duration::ZERO, Duration::from_secs(3600));

        reg.register(CorrelationId::from(1), noop());
        reg.register(CorrelationId::from(2), noop());

        assert!(reg.contains(CorrelationId::from(1)));
        assert!(reg.contains(CorrelationId::from(2)));
    }
}
