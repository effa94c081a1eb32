//! Singleton producer session.
//!
//! At most one producer is authenticated at a time. Claiming the slot and
//! releasing it are single critical sections under a `std::sync::Mutex`, so
//! two handshakes finishing together cannot both win.
//!
//! A successful claim returns a [`ProducerLease`]. Dropping the lease frees
//! the slot, whatever way the producer's task ends (clean close, error,
//! panic). The lease only clears the slot if it still holds its own session,
//! which keeps a late drop from evicting a newer producer.

use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use skylink_proto::Identity;

use crate::error::CoordinatorError;

/// The authenticated producer connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerSession {
    /// Unique per successful handshake
    pub id: u64,
    /// Identity proven during the handshake
    pub peer: Identity,
    /// Seconds since the Unix epoch when the session was established
    pub established_at: u64,
}

/// Shared slot holding the current producer session.
#[derive(Debug, Clone, Default)]
pub struct ProducerSlot {
    current: Arc<Mutex<Option<ProducerSession>>>,
    next_id: Arc<AtomicU64>,
}

impl ProducerSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<ProducerSession>> {
        // The guarded value is a plain Option, always consistent even if a
        // holder panicked.
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a producer is currently authenticated.
    pub fn is_occupied(&self) -> bool {
        self.lock().is_some()
    }

    /// Atomically install a new session.
    ///
    /// # Errors
    ///
    /// - `CoordinatorError::DuplicateProducer` if a session is already active
    pub fn try_claim(
        &self,
        peer: Identity,
        established_at: u64,
    ) -> Result<ProducerLease, CoordinatorError> {
        let mut current = self.lock();
        if current.is_some() {
            return Err(CoordinatorError::DuplicateProducer);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        *current = Some(ProducerSession { id, peer, established_at });

        Ok(ProducerLease { slot: self.clone(), session_id: id })
    }
}

/// Ownership of the producer slot. Releases it on drop.
#[derive(Debug)]
pub struct ProducerLease {
    slot: ProducerSlot,
    session_id: u64,
}

impl ProducerLease {
    /// Id of the session this lease holds.
    pub fn session_id(&self) -> u64 {
        self.session_id
    }
}

impl Drop for ProducerLease {
    fn drop(&mut self) {
        let mut current = self.slot.lock();
        if current.as_ref().is_some_and(|session| session.id == self.session_id) {
            *current = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_then_release() {
        let slot = ProducerSlot::new();
        assert!(!slot.is_occupied());

        let lease = slot.try_claim(Identity::Producer, 1000).unwrap();
        let session = slot.lock().clone().unwrap();
        assert_eq!(session.id, lease.session_id());
        assert_eq!(session.peer, Identity::Producer);
        assert_eq!(session.established_at, 1000);

        drop(lease);
        assert!(!slot.is_occupied());
    }

    #[test]
    fn second_claim_is_refused_while_held() {
        let slot = ProducerSlot::new();
        let _lease = slot.try_claim(Identity::Producer, 1000).unwrap();

        assert!(matches!(
            slot.try_claim(Identity::Producer, 1001),
            Err(CoordinatorError::DuplicateProducer)
        ));
    }

    #[test]
    fn slot_is_reusable_after_release() {
        let slot = ProducerSlot::new();
        let first = slot.try_claim(Identity::Producer, 1000).unwrap();
        let first_id = first.session_id();
        drop(first);

        let second = slot.try_claim(Identity::Producer, 1001).unwrap();
        assert_ne!(second.session_id(), first_id);
    }

    #[test]
    fn stale_lease_does_not_evict_newer_session() {
        let slot = ProducerSlot::new();
        let stale = ProducerLease { slot: slot.clone(), session_id: 99 };
        let current = slot.try_claim(Identity::Producer, 1000).unwrap();

        drop(stale);

        assert_eq!(slot.lock().as_ref().map(|s| s.id), Some(current.session_id()));
    }

    #[test]
    fn release_on_panic_unwind() {
        let slot = ProducerSlot::new();
        let task_slot = slot.clone();

        let result = std::thread::spawn(move || {
            let _lease = task_slot.try_claim(Identity::Producer, 1000).unwrap();
            panic!("producer task crashed");
        })
        .join();

        assert!(result.is_err());
        assert!(!slot.is_occupied());
    }
}
