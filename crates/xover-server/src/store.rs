//! In-memory registry of negotiation records.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::debug;
use xover_core::{NegotiationRecord, Role, SessionCode, SignalMessage};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Session {0} not found")]
    NotFound(SessionCode),
}

/// Source of "now" in milliseconds since the Unix epoch
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }
}

/// Session code -> negotiation record, each expiring a fixed time after creation.
///
/// Expired records are removed lazily on access and by [`RendezvousStore::sweep`].
pub struct RendezvousStore {
    records: DashMap<SessionCode, NegotiationRecord>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl RendezvousStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert a fresh record, replacing whatever was stored under `code`.
    pub fn create(&self, code: SessionCode) {
        let record = NegotiationRecord::new(self.clock.now_millis());
        self.records.insert(code, record);
    }

    /// A copy of the live record, removing it first if it has expired.
    pub fn get(&self, code: &SessionCode) -> Option<NegotiationRecord> {
        let now = self.clock.now_millis();
        {
            let record = self.records.get(code)?;
            if !record.is_expired(now, self.ttl) {
                return Some(record.clone());
            }
        }
        self.expire(code, now);
        None
    }

    pub fn set_offer(&self, code: &SessionCode, message: SignalMessage) -> Result<(), StoreError> {
        self.update(code, |record| record.offer = Some(message))
    }

    pub fn set_answer(&self, code: &SessionCode, message: SignalMessage) -> Result<(), StoreError> {
        self.update(code, |record| record.answer = Some(message))
    }

    pub fn append_candidate(
        &self,
        code: &SessionCode,
        message: SignalMessage,
        role: Role,
    ) -> Result<(), StoreError> {
        self.update(code, |record| match role {
            Role::Host => record.host_ice.push(message),
            Role::Joiner => record.joiner_ice.push(message),
        })
    }

    /// Role of a candidate publisher that did not say: host until an answer exists.
    pub fn candidate_role(&self, code: &SessionCode) -> Option<Role> {
        self.get(code).map(|record| match record.answer {
            Some(_) => Role::Joiner,
            None => Role::Host,
        })
    }

    /// Remove every expired record. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.records.len();
        self.records
            .retain(|_, record| !record.is_expired(now, self.ttl));
        before.saturating_sub(self.records.len())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn update<F>(&self, code: &SessionCode, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut NegotiationRecord),
    {
        let now = self.clock.now_millis();
        match self.records.get_mut(code) {
            Some(mut record) if !record.is_expired(now, self.ttl) => {
                apply(&mut record);
                Ok(())
            }
            Some(record) => {
                drop(record); // Release the shard lock before removing
                self.expire(code, now);
                Err(StoreError::NotFound(code.clone()))
            }
            None => Err(StoreError::NotFound(code.clone())),
        }
    }

    fn expire(&self, code: &SessionCode, now: u64) {
        if self
            .records
            .remove_if(code, |_, record| record.is_expired(now, self.ttl))
            .is_some()
        {
            debug!(code = %code, "Expired session removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct ManualClock(AtomicU64);

    impl ManualClock {
        fn set(&self, now: u64) {
            self.0.store(now, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_millis(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    const TTL: Duration = Duration::from_secs(300);
    const TTL_MS: u64 = 300_000;

    fn store_at(t0: u64) -> (RendezvousStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        clock.set(t0);
        (RendezvousStore::with_clock(TTL, clock.clone()), clock)
    }

    fn code(s: &str) -> SessionCode {
        SessionCode::parse(s).unwrap()
    }

    #[test]
    fn test_create_and_get() {
        let (store, _) = store_at(1_000);
        store.create(code("AAAAAA"));

        let record = store.get(&code("AAAAAA")).unwrap();
        assert_eq!(record.created_at, 1_000);
        assert!(record.offer.is_none());
        assert!(store.get(&code("BBBBBB")).is_none());
    }

    #[test]
    fn test_create_overwrites() {
        let (store, clock) = store_at(0);
        store.create(code("AAAAAA"));
        store
            .set_offer(&code("AAAAAA"), SignalMessage::offer("v=0", 1))
            .unwrap();

        clock.set(50);
        store.create(code("AAAAAA"));
        let record = store.get(&code("AAAAAA")).unwrap();
        assert!(record.offer.is_none());
        assert_eq!(record.created_at, 50);
    }

    #[test]
    fn test_record_expires_after_ttl() {
        let t0 = 10_000;
        let (store, clock) = store_at(t0);
        store.create(code("EXP123"));

        clock.set(t0 + TTL_MS - 1);
        assert!(store.get(&code("EXP123")).is_some());

        clock.set(t0 + TTL_MS + 1);
        assert!(store.get(&code("EXP123")).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_updates_fail_on_missing_or_expired() {
        let (store, clock) = store_at(0);
        let missing = store.set_answer(&code("NOPE00"), SignalMessage::answer("v=0", 1));
        assert!(matches!(missing, Err(StoreError::NotFound(_))));

        store.create(code("OLD000"));
        clock.set(TTL_MS + 1);
        let expired = store.append_candidate(
            &code("OLD000"),
            SignalMessage::ice(json!("c"), 2),
            Role::Host,
        );
        assert!(expired.is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_candidates_split_by_role() {
        let (store, _) = store_at(0);
        let c = code("ICE111");
        store.create(c.clone());

        assert_eq!(store.candidate_role(&c), Some(Role::Host));
        store
            .append_candidate(&c, SignalMessage::ice(json!("h1"), 1), Role::Host)
            .unwrap();
        store.set_answer(&c, SignalMessage::answer("v=0", 2)).unwrap();
        assert_eq!(store.candidate_role(&c), Some(Role::Joiner));
        store
            .append_candidate(&c, SignalMessage::ice(json!("j1"), 3), Role::Joiner)
            .unwrap();

        let record = store.get(&c).unwrap();
        assert_eq!(record.host_ice.len(), 1);
        assert_eq!(record.joiner_ice.len(), 1);
        assert_eq!(record.joiner_ice[0].candidate(), Some(&json!("j1")));
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let (store, clock) = store_at(0);
        store.create(code("OLD111"));
        clock.set(TTL_MS / 2);
        store.create(code("NEW111"));

        clock.set(TTL_MS + 10);
        assert_eq!(store.sweep(), 1);
        assert!(store.get(&code("NEW111")).is_some());
        assert_eq!(store.len(), 1);
    }
}
