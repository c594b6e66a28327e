//! Shutdown coordination for the harness.

use tokio_util::sync::CancellationToken;

/// Coordinator for graceful shutdown.
///
/// Long-running tasks hold a child token and stop between iterations once
/// the coordinator is triggered.
#[derive(Debug, Clone)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// The root token. Cancelling it is the same as [`Shutdown::trigger`].
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// A token cancelled when shutdown is triggered, which can also be
    /// cancelled on its own without affecting the root.
    pub fn subscribe(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve once shutdown has been triggered.
    pub async fn triggered(&self) {
        self.token.cancelled().await
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_subscribers() {
        let shutdown = Shutdown::new();
        let child = shutdown.subscribe();
        assert!(!child.is_cancelled());

        let waiter = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.triggered().await })
        };

        shutdown.trigger();
        assert!(shutdown.is_triggered());
        assert!(child.is_cancelled());
        waiter.await.unwrap();
    }

    #[test]
    fn test_subscriber_cancel_is_local() {
        let shutdown = Shutdown::new();
        let child = shutdown.subscribe();
        child.cancel();
        assert!(!shutdown.is_triggered());
    }
}
