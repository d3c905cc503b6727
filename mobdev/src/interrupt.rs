//! Caller-side cancellation signal
//!
//! Plays the role of a pending signal on the calling task: while raised, any
//! lock or gate wait performed on behalf of the caller gives up with
//! `DeviceError::Interrupted`. A raised interrupt stays raised until cleared,
//! so the caller decides when to retry.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone)]
pub struct Interrupt {
    state: Arc<watch::Sender<bool>>,
}

impl Interrupt {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            state: Arc::new(tx),
        }
    }

    /// Raise the interrupt, aborting current and future waits
    pub fn raise(&self) {
        self.state.send_replace(true);
    }

    /// Clear a raised interrupt
    pub fn clear(&self) {
        self.state.send_replace(false);
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves once the interrupt is raised
    pub async fn raised(&self) {
        let mut rx = self.state.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Unreachable while `self` holds the sender
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Interrupt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interrupt(raised={})", self.is_raised())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_raise_and_clear() {
        let interrupt = Interrupt::new();
        assert!(!interrupt.is_raised());
        interrupt.raise();
        assert!(interrupt.is_raised());
        interrupt.clear();
        assert!(!interrupt.is_raised());
    }

    #[test]
    fn test_clone_shares_state() {
        let a = Interrupt::new();
        let b = a.clone();
        b.raise();
        assert!(a.is_raised());
    }

    #[tokio::test]
    async fn test_raised_resolves_when_already_raised() {
        let interrupt = Interrupt::new();
        interrupt.raise();
        tokio::time::timeout(Duration::from_secs(1), interrupt.raised())
            .await
            .expect("should resolve immediately");
    }

    #[tokio::test]
    async fn test_raised_waits_for_raise() {
        let interrupt = Interrupt::new();
        let waiter = {
            let interrupt = interrupt.clone();
            tokio::spawn(async move { interrupt.raised().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        interrupt.raise();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
    }
}
