//! Evaluation outcomes and one-shot decision handles.

use tokio::sync::oneshot;

/// Sending half of a decision handle pair.
///
/// Held by the component that will eventually produce the decision (a release
/// ticker). Dropping it unresolved abandons the handle.
#[derive(Debug)]
pub struct DecisionSender {
    tx: oneshot::Sender<bool>,
}

impl DecisionSender {
    /// Resolve the paired handle with a final decision.
    pub fn resolve(self, allowed: bool) {
        // The receiver may have been dropped by an impatient caller.
        let _ = self.tx.send(allowed);
    }
}

/// A one-shot handle that eventually yields a final allow/deny decision.
///
/// Once resolved, the value is cached and repeated reads return the same
/// boolean. If the sending half is dropped without resolving (a shaper that
/// was shut down with the request still queued), the handle never resolves:
/// [`DecisionHandle::decision`] parks forever, and callers that must make
/// progress are expected to bound the wait themselves.
#[derive(Debug)]
pub struct DecisionHandle {
    rx: Option<oneshot::Receiver<bool>>,
    resolved: Option<bool>,
}

impl DecisionHandle {
    /// Create a connected sender/handle pair.
    pub fn pair() -> (DecisionSender, DecisionHandle) {
        let (tx, rx) = oneshot::channel();
        (
            DecisionSender { tx },
            DecisionHandle {
                rx: Some(rx),
                resolved: None,
            },
        )
    }

    /// Wait for the decision.
    ///
    /// Suspends until the paired [`DecisionSender`] resolves. An abandoned
    /// handle never completes.
    pub async fn decision(&mut self) -> bool {
        if let Some(value) = self.resolved {
            return value;
        }
        let rx = match self.rx.take() {
            Some(rx) => rx,
            None => return false,
        };
        match rx.await {
            Ok(value) => {
                self.resolved = Some(value);
                value
            }
            // Sender dropped without resolving: the decision was abandoned.
            Err(_) => std::future::pending().await,
        }
    }
}

/// The outcome of one evaluation against a per-key evaluator.
///
/// Invariant: when `delayed` is false, `allowed` is final and requires no
/// further waiting. Only the leaky bucket evaluator produces delayed
/// responses; the handle then carries the real decision.
#[derive(Debug)]
pub struct AlgorithmResponse {
    allowed: bool,
    delayed: bool,
    handle: Option<DecisionHandle>,
}

impl AlgorithmResponse {
    /// A final, immediate allow.
    pub fn allow() -> Self {
        Self {
            allowed: true,
            delayed: false,
            handle: None,
        }
    }

    /// A final, immediate deny.
    pub fn deny() -> Self {
        Self {
            allowed: false,
            delayed: false,
            handle: None,
        }
    }

    /// A delayed admission: the request was queued and the handle yields the
    /// real decision once released.
    pub fn delayed(handle: DecisionHandle) -> Self {
        Self {
            allowed: true,
            delayed: true,
            handle: Some(handle),
        }
    }

    /// Whether the request was admitted (final only when not delayed).
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// Whether the real decision arrives later through the handle.
    pub fn is_delayed(&self) -> bool {
        self.delayed
    }

    /// Take ownership of the delayed decision handle, if any.
    pub fn take_handle(&mut self) -> Option<DecisionHandle> {
        self.handle.take()
    }
}
