use crate::error::HierarchyError;
use std::cell::Cell;

/// Non-reentrant guard for mutating UI callbacks.
///
/// A nested `acquire` while a [`LockGuard`] is alive fails right away
/// with [`HierarchyError::Locked`]. The flag is released when the guard
/// goes out of scope, including early returns and unwinding.
#[derive(Debug, Default)]
pub struct InteractionLock {
    held: Cell<bool>,
}

pub struct LockGuard<'a> {
    lock: &'a InteractionLock,
}

impl InteractionLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self) -> anyhow::Result<LockGuard<'_>> {
        if self.held.replace(true) {
            return Err(HierarchyError::Locked.into());
        }
        Ok(LockGuard { lock: self })
    }

    pub fn is_held(&self) -> bool {
        self.held.get()
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.held.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_acquire_is_rejected() -> anyhow::Result<()> {
        let lock = InteractionLock::new();
        {
            let _guard = lock.acquire()?;
            assert!(lock.is_held());
            let err = lock.acquire().err().ok_or(anyhow::anyhow!("should fail"))?;
            assert_eq!(
                err.downcast_ref::<HierarchyError>(),
                Some(&HierarchyError::Locked)
            );
        }
        assert!(!lock.is_held());
        let _again = lock.acquire()?;
        Ok(())
    }

    #[test]
    fn released_after_failure() {
        let lock = InteractionLock::new();
        let failing = || -> anyhow::Result<()> {
            let _guard = lock.acquire()?;
            anyhow::bail!("interaction failed")
        };
        assert!(failing().is_err());
        assert!(!lock.is_held());
    }

    #[test]
    fn released_after_panic() {
        let lock = InteractionLock::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = lock.acquire();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(!lock.is_held());
    }
}
