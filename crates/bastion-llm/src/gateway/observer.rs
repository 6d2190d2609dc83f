use super::RequestOutcome;

/// Receives one [`RequestOutcome`] per upstream attempt
///
/// Implementations must not fail the call; errors are theirs to log.
#[async_trait::async_trait]
pub trait AttemptObserver: Send + Sync {
    /// Called after every attempt, successful or not
    async fn on_attempt(&self, outcome: &RequestOutcome);
}

/// Observer that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

#[async_trait::async_trait]
impl AttemptObserver for NoopObserver {
    async fn on_attempt(&self, _outcome: &RequestOutcome) {}
}
