//! # Key Pool and Scheduler Scenarios

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use esc_01_key_pool::{AdminIdentity, KeyPool, SecretSeed};
    use esc_02_task_scheduler::{StopSignal, TaskScheduler};
    use esc_06_reconciliation::test_utils::escrow_admin;
    use shared_types::{AccountId, AuthGroup};
    use tokio_test::{assert_pending, assert_ready, task};

    fn admin(byte: u8) -> AdminIdentity {
        AdminIdentity::new(
            format!("admin-{byte}"),
            AccountId::new([byte; 32]),
            SecretSeed::new([byte; 32]),
        )
    }

    #[tokio::test]
    async fn test_lease_beyond_group_size_waits_for_release() {
        let pool = KeyPool::builder(escrow_admin())
            .with_collection_admin(3, admin(1))
            .with_collection_admin(3, admin(2))
            .build();
        let group = AuthGroup::Collection(3);

        // Two secondaries plus the primary.
        let first = pool.acquire(group).await;
        let second = pool.acquire(group).await;
        let third = pool.acquire(group).await;
        assert!(third.is_primary());

        let mut fourth = task::spawn(pool.acquire(group));
        assert_pending!(fourth.poll());
        assert_eq!(pool.waiting(group), 1);

        drop(second);
        assert!(fourth.is_woken());
        let lease = assert_ready!(fourth.poll());
        assert!(!lease.is_primary());
        drop((first, third, lease));
        assert_eq!(pool.free_count(), 3);
    }

    #[tokio::test]
    async fn test_rotation_visits_each_key_once() {
        let pool = KeyPool::builder(escrow_admin())
            .with_contract_admin(admin(1))
            .with_contract_admin(admin(2))
            .with_contract_admin(admin(3))
            .build();

        let mut seen = HashSet::new();
        for _ in 0..3 {
            let lease = pool.acquire(AuthGroup::Contract).await;
            assert!(seen.insert(lease.account()), "repeated before full cycle");
        }
        assert_eq!(seen.len(), 3);
        assert!(!seen.contains(&pool.primary().account()));
    }

    #[tokio::test]
    async fn test_collection_key_not_used_for_other_groups() {
        let pool = KeyPool::builder(escrow_admin())
            .with_collection_admin(3, admin(1))
            .build();
        let lease = pool.acquire(AuthGroup::Contract).await;
        assert!(lease.is_primary());
        assert!(pool.try_acquire(AuthGroup::Contract).is_none());
        assert!(pool.try_acquire(AuthGroup::Collection(3)).is_some());
    }

    #[tokio::test]
    async fn test_twenty_five_units_under_cap_of_twenty() {
        let scheduler = TaskScheduler::new(20, StopSignal::new());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..25 {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            let done = Arc::clone(&done);
            scheduler
                .submit(async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    done.fetch_add(1, Ordering::SeqCst);
                })
                .await
                .unwrap();
            assert!(scheduler.in_flight() <= 20);
        }

        scheduler.drain().await;
        assert_eq!(done.load(Ordering::SeqCst), 25);
        assert!(peak.load(Ordering::SeqCst) <= 20);
    }
}
