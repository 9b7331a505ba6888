//! # Key Pool Service
//!
//! Leases admin signing keys to concurrent workers.
//!
//! A worker asks for a key of a given authorization group. It gets the next
//! free secondary key of that group, the primary key if none is free, or it
//! waits. A released key goes straight to the oldest waiter that may use it,
//! so no waiter can be overtaken by a newcomer calling `try_take`.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use shared_types::{AccountId, AuthGroup};
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::domain::{AdminIdentity, KeyIndex, RotationTable, PRIMARY_INDEX};

type Handoff = oneshot::Sender<KeyIndex>;

struct Shared {
    identities: Vec<Arc<AdminIdentity>>,
    table: Mutex<RotationTable<Handoff>>,
}

impl Shared {
    fn release(&self, index: KeyIndex) {
        let mut table = self.table.lock();
        loop {
            match table.next_waiter_for(index) {
                Some(waiter) => {
                    // A closed receiver means the waiter gave up; try the next one.
                    if waiter.send(index).is_ok() {
                        trace!("[esc-01] Key {} handed to waiter", index);
                        return;
                    }
                }
                None => {
                    table.mark_free(index);
                    trace!("[esc-01] Key {} back in pool", index);
                    return;
                }
            }
        }
    }
}

/// Pool of admin signing keys.
#[derive(Clone)]
pub struct KeyPool {
    shared: Arc<Shared>,
}

impl KeyPool {
    /// Create a pool from the primary admin and tagged secondaries.
    pub fn new(primary: AdminIdentity, secondaries: Vec<(AdminIdentity, AuthGroup)>) -> Self {
        secondaries
            .into_iter()
            .fold(Self::builder(primary), |builder, (identity, group)| {
                builder.with_admin(group, identity)
            })
            .build()
    }

    /// Start building a pool around the primary escrow admin.
    pub fn builder(primary: AdminIdentity) -> KeyPoolBuilder {
        KeyPoolBuilder {
            primary,
            secondaries: Vec::new(),
        }
    }

    /// Lease a key for `group`, run `worker` with it, and return its result.
    ///
    /// The lease is returned when the worker drops it, at the latest when the
    /// worker future completes. Errors inside the worker are the worker's
    /// business; the key comes back either way.
    pub async fn lease<F, Fut, T>(&self, group: AuthGroup, worker: F) -> T
    where
        F: FnOnce(KeyLease) -> Fut,
        Fut: Future<Output = T>,
    {
        let lease = self.acquire(group).await;
        worker(lease).await
    }

    /// Wait for a key of `group`.
    pub async fn acquire(&self, group: AuthGroup) -> KeyLease {
        loop {
            let rx = {
                let mut table = self.shared.table.lock();
                if let Some(index) = table.try_take(group) {
                    return self.issue(index, group);
                }
                let (tx, rx) = oneshot::channel();
                table.enqueue(group, tx);
                rx
            };

            debug!("[esc-01] No free key for {}, waiting", group);
            let mut pending = PendingLease {
                shared: Arc::clone(&self.shared),
                rx,
                settled: false,
            };
            if let Some(index) = pending.wait().await {
                return self.issue(index, group);
            }
        }
    }

    /// Take a key without waiting.
    pub fn try_acquire(&self, group: AuthGroup) -> Option<KeyLease> {
        let index = self.shared.table.lock().try_take(group)?;
        Some(self.issue(index, group))
    }

    /// Number of keys not currently leased.
    pub fn free_count(&self) -> usize {
        self.shared.table.lock().free_count()
    }

    /// Number of workers queued on `group`.
    pub fn waiting(&self, group: AuthGroup) -> usize {
        self.shared.table.lock().waiting(group)
    }

    /// Total keys, primary included.
    pub fn size(&self) -> usize {
        self.shared.identities.len()
    }

    /// The primary escrow admin.
    pub fn primary(&self) -> &AdminIdentity {
        &self.shared.identities[PRIMARY_INDEX]
    }

    fn issue(&self, index: KeyIndex, group: AuthGroup) -> KeyLease {
        trace!("[esc-01] Key {} leased for {}", index, group);
        KeyLease {
            shared: Arc::clone(&self.shared),
            index,
            group,
            released: AtomicBool::new(false),
        }
    }
}

impl fmt::Debug for KeyPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPool")
            .field("size", &self.size())
            .field("free", &self.free_count())
            .finish()
    }
}

/// Builder collecting secondary admins and their groups.
pub struct KeyPoolBuilder {
    primary: AdminIdentity,
    secondaries: Vec<(AdminIdentity, AuthGroup)>,
}

impl KeyPoolBuilder {
    /// Add an admin allowed to call the matcher contract.
    pub fn with_contract_admin(mut self, identity: AdminIdentity) -> Self {
        self.secondaries.push((identity, AuthGroup::Contract));
        self
    }

    /// Add an admin allowed to move tokens of `collection_id`.
    pub fn with_collection_admin(mut self, collection_id: u64, identity: AdminIdentity) -> Self {
        self.secondaries
            .push((identity, AuthGroup::Collection(collection_id)));
        self
    }

    /// Add an admin for an arbitrary group.
    pub fn with_admin(mut self, group: AuthGroup, identity: AdminIdentity) -> Self {
        self.secondaries.push((identity, group));
        self
    }

    /// Build the pool.
    ///
    /// The same account listed under several groups becomes one key with
    /// several tags. Secondaries sharing the primary's account are dropped;
    /// the primary already serves every group.
    pub fn build(self) -> KeyPool {
        let primary_account = self.primary.account();
        let mut identities = vec![Arc::new(self.primary)];
        let mut tags: Vec<Vec<AuthGroup>> = vec![Vec::new()];

        for (identity, group) in self.secondaries {
            if identity.account() == primary_account {
                continue;
            }
            match identities
                .iter()
                .position(|known| known.account() == identity.account())
            {
                Some(index) => {
                    if !tags[index].contains(&group) {
                        tags[index].push(group);
                    }
                }
                None => {
                    identities.push(Arc::new(identity));
                    tags.push(vec![group]);
                }
            }
        }

        debug!("[esc-01] Key pool ready with {} keys", identities.len());
        KeyPool {
            shared: Arc::new(Shared {
                identities,
                table: Mutex::new(RotationTable::new(tags)),
            }),
        }
    }
}

/// Queued request for a key. Dropping it before the hand-off completes
/// returns any key that raced in.
struct PendingLease {
    shared: Arc<Shared>,
    rx: oneshot::Receiver<KeyIndex>,
    settled: bool,
}

impl PendingLease {
    async fn wait(&mut self) -> Option<KeyIndex> {
        let received = (&mut self.rx).await.ok();
        self.settled = true;
        received
    }
}

impl Drop for PendingLease {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.rx.close();
        if let Ok(index) = self.rx.try_recv() {
            self.shared.release(index);
        }
    }
}

/// Exclusive right to sign with one admin key.
///
/// Released explicitly with [`release`](Self::release) or on drop, whichever
/// comes first. Releasing twice is a no-op.
pub struct KeyLease {
    shared: Arc<Shared>,
    index: KeyIndex,
    group: AuthGroup,
    released: AtomicBool,
}

impl KeyLease {
    /// Identity to sign with.
    pub fn identity(&self) -> &AdminIdentity {
        &self.shared.identities[self.index]
    }

    /// Account of the leased key.
    pub fn account(&self) -> AccountId {
        self.identity().account()
    }

    /// Group the lease was requested for.
    pub fn group(&self) -> AuthGroup {
        self.group
    }

    /// Whether this is the primary escrow admin.
    pub fn is_primary(&self) -> bool {
        self.index == PRIMARY_INDEX
    }

    /// Whether the key was already given back.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Give the key back to the pool.
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            self.shared.release(self.index);
        }
    }
}

impl Drop for KeyLease {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for KeyLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyLease")
            .field("identity", self.identity())
            .field("group", &self.group)
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SecretSeed;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready, task};

    fn admin(byte: u8) -> AdminIdentity {
        AdminIdentity::new(
            format!("admin-{byte}"),
            AccountId::new([byte; 32]),
            SecretSeed::new([byte; 32]),
        )
    }

    fn pool_with(contract_admins: &[u8]) -> KeyPool {
        contract_admins
            .iter()
            .fold(KeyPool::builder(admin(0)), |builder, byte| {
                builder.with_contract_admin(admin(*byte))
            })
            .build()
    }

    #[test]
    fn test_duplicate_accounts_merge() {
        let pool = KeyPool::builder(admin(0))
            .with_contract_admin(admin(1))
            .with_collection_admin(25, admin(1))
            .with_contract_admin(admin(0))
            .build();
        assert_eq!(pool.size(), 2);

        let lease = pool.try_acquire(AuthGroup::Collection(25)).unwrap();
        assert_eq!(lease.account(), AccountId::new([1; 32]));
        assert!(!lease.is_primary());
    }

    #[test]
    fn test_rotation_before_primary() {
        let pool = pool_with(&[1, 2]);
        let a = pool.try_acquire(AuthGroup::Contract).unwrap();
        let b = pool.try_acquire(AuthGroup::Contract).unwrap();
        let c = pool.try_acquire(AuthGroup::Contract).unwrap();
        assert!(!a.is_primary());
        assert!(!b.is_primary());
        assert_ne!(a.account(), b.account());
        assert!(c.is_primary());
        assert!(pool.try_acquire(AuthGroup::Contract).is_none());
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn test_collection_without_admins_uses_primary() {
        let pool = pool_with(&[1]);
        let lease = pool.try_acquire(AuthGroup::Collection(7)).unwrap();
        assert!(lease.is_primary());
        assert!(pool.try_acquire(AuthGroup::Collection(7)).is_none());
    }

    #[test]
    fn test_release_is_idempotent() {
        let pool = pool_with(&[1]);
        let lease = pool.try_acquire(AuthGroup::Contract).unwrap();
        lease.release();
        lease.release();
        assert!(lease.is_released());
        drop(lease);
        assert_eq!(pool.free_count(), 2);
    }

    #[tokio::test]
    async fn test_extra_lease_waits_for_release() {
        let pool = pool_with(&[1]);
        let first = pool.acquire(AuthGroup::Contract).await;
        let second = pool.acquire(AuthGroup::Contract).await;

        let mut third = task::spawn(pool.acquire(AuthGroup::Contract));
        assert_pending!(third.poll());
        assert_eq!(pool.waiting(AuthGroup::Contract), 1);

        let freed = first.account();
        first.release();
        assert!(third.is_woken());
        let lease = assert_ready!(third.poll());
        assert_eq!(lease.account(), freed);
        drop(second);
    }

    #[tokio::test]
    async fn test_waiters_served_in_order() {
        let pool = pool_with(&[]);
        let held = pool.acquire(AuthGroup::Contract).await;

        let mut early = task::spawn(pool.acquire(AuthGroup::Contract));
        let mut late = task::spawn(pool.acquire(AuthGroup::Contract));
        assert_pending!(early.poll());
        assert_pending!(late.poll());

        drop(held);
        let lease = assert_ready!(early.poll());
        assert_pending!(late.poll());
        drop(lease);
        assert_ready!(late.poll());
    }

    #[tokio::test]
    async fn test_primary_release_wakes_other_group() {
        let pool = KeyPool::builder(admin(0))
            .with_collection_admin(1, admin(1))
            .build();
        let collection = pool.acquire(AuthGroup::Collection(1)).await;
        let primary = pool.acquire(AuthGroup::Contract).await;
        assert!(primary.is_primary());

        let mut waiter = task::spawn(pool.acquire(AuthGroup::Contract));
        assert_pending!(waiter.poll());

        // A collection key cannot serve the contract group.
        drop(collection);
        assert_pending!(waiter.poll());
        assert_eq!(pool.free_count(), 1);

        drop(primary);
        let lease = assert_ready!(waiter.poll());
        assert!(lease.is_primary());
    }

    #[tokio::test]
    async fn test_abandoned_waiter_does_not_leak_key() {
        let pool = pool_with(&[]);
        let held = pool.acquire(AuthGroup::Contract).await;

        let mut waiter = task::spawn(pool.acquire(AuthGroup::Contract));
        assert_pending!(waiter.poll());
        drop(waiter);

        drop(held);
        assert_eq!(pool.free_count(), 1);
        assert!(pool.try_acquire(AuthGroup::Contract).is_some());
    }

    #[tokio::test]
    async fn test_worker_error_still_returns_key() {
        let pool = pool_with(&[1]);
        let result: Result<(), &str> = pool
            .lease(AuthGroup::Contract, |_lease| async { Err("boom") })
            .await;
        assert!(result.is_err());
        assert_eq!(pool.free_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_leases_never_share_a_key() {
        let pool = pool_with(&[1, 2, 3]);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let pool = pool.clone();
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                pool.lease(AuthGroup::Contract, |lease| async move {
                    let _held = lease;
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                })
                .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 4);
        assert_eq!(pool.free_count(), 4);
    }
}
