use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use koach_core::model::PlanId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-plan async locks serializing read-modify-write of a plan.
#[derive(Default)]
pub(crate) struct PlanLocks {
    locks: Mutex<HashMap<PlanId, Arc<AsyncMutex<()>>>>,
}

impl PlanLocks {
    /// Wait for exclusive access to `plan_id`. Released when the guard drops.
    pub(crate) async fn acquire(&self, plan_id: PlanId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Drop entries nobody holds or waits on.
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            Arc::clone(locks.entry(plan_id).or_default())
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_plan_is_exclusive() {
        let locks = PlanLocks::default();
        let guard = locks.acquire(PlanId::new(1)).await;

        let lock = {
            let map = locks.locks.lock().unwrap();
            Arc::clone(map.get(&PlanId::new(1)).unwrap())
        };
        assert!(lock.try_lock().is_err());

        drop(guard);
        assert!(lock.try_lock().is_ok());
    }

    #[tokio::test]
    async fn different_plans_do_not_block() {
        let locks = PlanLocks::default();
        let _a = locks.acquire(PlanId::new(1)).await;
        let _b = locks.acquire(PlanId::new(2)).await;
        assert_eq!(locks.tracked(), 2);
    }

    #[tokio::test]
    async fn released_locks_are_pruned() {
        let locks = PlanLocks::default();
        drop(locks.acquire(PlanId::new(1)).await);
        drop(locks.acquire(PlanId::new(2)).await);
        assert_eq!(locks.tracked(), 1);
    }
}
