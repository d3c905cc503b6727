//! Interruptible mutual exclusion around a device's store
//!
//! Wraps `tokio::sync::Mutex` (FIFO-fair) and adds the two acquisition modes
//! the driver needs: an interruptible wait used by read/write/seek, and a
//! non-blocking attempt used by the status reporter.

use tokio::sync::{Mutex, MutexGuard};

use crate::error::DeviceError;
use crate::interrupt::Interrupt;

pub struct AccessLock<T> {
    inner: Mutex<T>,
}

impl<T> AccessLock<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Acquire the lock, giving up if `interrupt` is raised while waiting
    ///
    /// An uncontended lock is taken even if the interrupt is already raised;
    /// only an actual wait can be interrupted.
    ///
    /// # Errors
    /// `Interrupted` if the interrupt fires before the lock is granted.
    pub async fn lock_interruptible(
        &self,
        interrupt: &Interrupt,
    ) -> Result<MutexGuard<'_, T>, DeviceError> {
        if let Ok(guard) = self.inner.try_lock() {
            return Ok(guard);
        }
        tokio::select! {
            biased;
            guard = self.inner.lock() => Ok(guard),
            () = interrupt.raised() => {
                log::debug!("access lock wait interrupted");
                Err(DeviceError::Interrupted)
            }
        }
    }

    /// Acquire the lock without the possibility of interruption
    ///
    /// Used only on teardown, where the caller must outlast every holder.
    pub async fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().await
    }

    /// Take the lock only if it is free right now
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.inner.try_lock().ok()
    }
}

impl<T> std::fmt::Debug for AccessLock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = if self.inner.try_lock().is_ok() {
            "free"
        } else {
            "held"
        };
        write!(f, "AccessLock({state})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_uncontended_lock_ignores_raised_interrupt() {
        let lock = AccessLock::new(5);
        let interrupt = Interrupt::new();
        interrupt.raise();
        let guard = lock.lock_interruptible(&interrupt).await.unwrap();
        assert_eq!(*guard, 5);
    }

    #[tokio::test]
    async fn test_try_lock_fails_while_held() {
        let lock = AccessLock::new(());
        let guard = lock.try_lock().unwrap();
        assert!(lock.try_lock().is_none());
        drop(guard);
        assert!(lock.try_lock().is_some());
    }

    #[tokio::test]
    async fn test_contended_wait_is_interruptible() {
        let lock = std::sync::Arc::new(AccessLock::new(0u32));
        let interrupt = Interrupt::new();
        let held = lock.try_lock().unwrap();

        let waiter = {
            let lock = std::sync::Arc::clone(&lock);
            let interrupt = interrupt.clone();
            tokio::spawn(async move { lock.lock_interruptible(&interrupt).await.map(|g| *g) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        interrupt.raise();

        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Err(DeviceError::Interrupted));
        drop(held);
    }

    #[tokio::test]
    async fn test_contended_wait_gets_lock_on_release() {
        let lock = std::sync::Arc::new(AccessLock::new(0u32));
        let interrupt = Interrupt::new();
        let mut held = lock.try_lock().unwrap();

        let waiter = {
            let lock = std::sync::Arc::clone(&lock);
            tokio::spawn(async move { lock.lock_interruptible(&interrupt).await.map(|g| *g) })
        };

        *held = 7;
        drop(held);

        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Ok(7));
    }
}
