//! Pipeline evaluation outcomes.

use crate::limit::DecisionHandle;

/// The outcome of a full pipeline evaluation.
///
/// A synchronous response carries a final boolean and can be read repeatedly
/// without suspending. An asynchronous response wraps a shaper-owned
/// [`DecisionHandle`]; reading it suspends until the shaper resolves the
/// decision, after which the value is cached and re-readable.
#[derive(Debug)]
pub struct PipelineResponse {
    kind: ResponseKind,
}

#[derive(Debug)]
enum ResponseKind {
    Sync(bool),
    Async(DecisionHandle),
}

impl PipelineResponse {
    /// A final decision available immediately.
    pub fn sync(allowed: bool) -> Self {
        Self {
            kind: ResponseKind::Sync(allowed),
        }
    }

    /// A decision that arrives later through the given handle.
    pub fn asynchronous(handle: DecisionHandle) -> Self {
        Self {
            kind: ResponseKind::Async(handle),
        }
    }

    /// Whether reading the decision may suspend.
    pub fn is_async(&self) -> bool {
        matches!(self.kind, ResponseKind::Async(_))
    }

    /// Read the decision.
    ///
    /// Never suspends for a synchronous response. For an asynchronous
    /// response this waits on the shaper; a handle abandoned by shaper
    /// shutdown never resolves, so callers that must make progress apply
    /// their own timeout.
    pub async fn allowed(&mut self) -> bool {
        match &mut self.kind {
            ResponseKind::Sync(allowed) => *allowed,
            ResponseKind::Async(handle) => handle.decision().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sync_read_is_idempotent() {
        let mut response = PipelineResponse::sync(true);
        assert!(!response.is_async());
        assert!(response.allowed().await);
        assert!(response.allowed().await);

        let mut denied = PipelineResponse::sync(false);
        assert!(!denied.allowed().await);
        assert!(!denied.allowed().await);
    }

    #[tokio::test]
    async fn test_async_read_caches_resolved_value() {
        let (sender, handle) = DecisionHandle::pair();
        let mut response = PipelineResponse::asynchronous(handle);
        assert!(response.is_async());

        sender.resolve(true);
        assert!(response.allowed().await);
        // The handle is spent; the cached value must answer again.
        assert!(response.allowed().await);
    }
}
