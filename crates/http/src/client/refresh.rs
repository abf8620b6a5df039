//! Single-flight token refresh coordination
//!
//! The coordinator owns the in-flight flag and the queue of requests waiting
//! on the current refresh. Both are mutated under one lock, so checking the
//! flag and enqueueing behind it is a single atomic step and two refreshes
//! can never start together.

use super::error::{ClientError, MSG_SESSION_EXPIRED};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::debug;

/// Result delivered to requests queued behind a refresh
pub type RefreshOutcome = Result<String, RefreshRejection>;

/// Why a refresh did not produce a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshRejection {
    /// No refresh token was stored
    MissingRefreshToken,
    /// The refresh call failed
    Failed(String),
    /// The leading request went away before the refresh finished; the
    /// stored tokens are untouched and waiters may start another refresh
    Cancelled,
}

impl From<RefreshRejection> for ClientError {
    fn from(rejection: RefreshRejection) -> Self {
        match rejection {
            RefreshRejection::MissingRefreshToken => {
                Self::Unauthenticated(MSG_SESSION_EXPIRED.to_string())
            }
            RefreshRejection::Failed(message) => Self::RefreshFailed(message),
            RefreshRejection::Cancelled => Self::RefreshFailed("token refresh was cancelled".into()),
        }
    }
}

#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    queue: Vec<oneshot::Sender<RefreshOutcome>>,
}

/// What a request that hit a 401 should do next
pub enum Ticket<'a> {
    /// No refresh was running; the holder now runs it and must settle it
    Lead(RefreshGuard<'a>),
    /// A refresh is running; await its outcome
    Wait(oneshot::Receiver<RefreshOutcome>),
}

/// Process-wide refresh state
///
/// One coordinator is shared by every client that shares a credential
/// store. Separate sessions get separate coordinators.
#[derive(Default)]
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a refresh, or queue behind the one already running
    pub fn begin_or_enqueue(&self) -> Ticket<'_> {
        let mut state = self.lock();
        if state.in_flight {
            let (tx, rx) = oneshot::channel();
            state.queue.push(tx);
            debug!(queued = state.queue.len(), "Request queued behind token refresh");
            Ticket::Wait(rx)
        } else {
            state.in_flight = true;
            Ticket::Lead(RefreshGuard {
                coordinator: self,
                settled: false,
            })
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().in_flight
    }

    /// Number of requests waiting on the current refresh
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    /// Clear the flag and hand `outcome` to every waiter in enqueue order
    fn settle(&self, outcome: &RefreshOutcome) -> usize {
        let waiters = {
            let mut state = self.lock();
            state.in_flight = false;
            std::mem::take(&mut state.queue)
        };

        let drained = waiters.len();
        for waiter in waiters {
            // A waiter that stopped listening has nothing left to replay
            let _ = waiter.send(outcome.clone());
        }
        drained
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive right to run the current refresh
///
/// Dropping the guard without settling clears the flag and hands every
/// waiter [`RefreshRejection::Cancelled`], so one of them can lead a new
/// refresh.
pub struct RefreshGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl RefreshGuard<'_> {
    /// Hand the new access token to all waiters; returns how many there were
    pub fn resolve(mut self, access_token: String) -> usize {
        self.settled = true;
        self.coordinator.settle(&Ok(access_token))
    }

    /// Fail all waiters with `rejection`; returns how many there were
    pub fn reject(mut self, rejection: RefreshRejection) -> usize {
        self.settled = true;
        self.coordinator.settle(&Err(rejection))
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let cancelled = self.coordinator.settle(&Err(RefreshRejection::Cancelled));
            debug!(cancelled, "Token refresh abandoned by its leader");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(ticket: Ticket<'_>) -> RefreshGuard<'_> {
        match ticket {
            Ticket::Lead(guard) => guard,
            Ticket::Wait(_) => panic!("expected to lead the refresh"),
        }
    }

    fn wait(ticket: Ticket<'_>) -> oneshot::Receiver<RefreshOutcome> {
        match ticket {
            Ticket::Wait(rx) => rx,
            Ticket::Lead(_) => panic!("expected to wait on the refresh"),
        }
    }

    #[tokio::test]
    async fn waiters_receive_the_new_token() {
        let coordinator = RefreshCoordinator::new();
        let guard = lead(coordinator.begin_or_enqueue());
        let first = wait(coordinator.begin_or_enqueue());
        let second = wait(coordinator.begin_or_enqueue());
        assert!(coordinator.is_refreshing());
        assert_eq!(coordinator.pending(), 2);

        assert_eq!(guard.resolve("fresh".into()), 2);
        assert!(!coordinator.is_refreshing());
        assert_eq!(coordinator.pending(), 0);
        assert_eq!(first.await.unwrap(), Ok("fresh".to_string()));
        assert_eq!(second.await.unwrap(), Ok("fresh".to_string()));
    }

    #[tokio::test]
    async fn waiters_fail_together() {
        let coordinator = RefreshCoordinator::new();
        let guard = lead(coordinator.begin_or_enqueue());
        let waiters: Vec<_> = (0..3).map(|_| wait(coordinator.begin_or_enqueue())).collect();

        guard.reject(RefreshRejection::Failed("401".into()));
        for waiter in waiters {
            assert_eq!(
                waiter.await.unwrap(),
                Err(RefreshRejection::Failed("401".into()))
            );
        }
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn dropped_guard_releases_the_flag() {
        let coordinator = RefreshCoordinator::new();
        let guard = lead(coordinator.begin_or_enqueue());
        let waiter = wait(coordinator.begin_or_enqueue());
        drop(guard);

        assert!(!coordinator.is_refreshing());
        assert_eq!(waiter.await.unwrap(), Err(RefreshRejection::Cancelled));

        // The next 401 starts a fresh cycle
        let _next = lead(coordinator.begin_or_enqueue());
    }

    #[tokio::test]
    async fn cancelled_waiters_elect_a_new_leader() {
        let coordinator = RefreshCoordinator::new();
        let guard = lead(coordinator.begin_or_enqueue());
        let first = wait(coordinator.begin_or_enqueue());
        let second = wait(coordinator.begin_or_enqueue());
        drop(guard);

        assert_eq!(first.await.unwrap(), Err(RefreshRejection::Cancelled));
        assert_eq!(second.await.unwrap(), Err(RefreshRejection::Cancelled));

        let retry = lead(coordinator.begin_or_enqueue());
        let behind = wait(coordinator.begin_or_enqueue());
        assert_eq!(retry.resolve("fresh".into()), 1);
        assert_eq!(behind.await.unwrap(), Ok("fresh".to_string()));
    }

    #[test]
    fn rejection_maps_to_client_error() {
        assert!(matches!(
            ClientError::from(RefreshRejection::MissingRefreshToken),
            ClientError::Unauthenticated(_)
        ));
        assert!(matches!(
            ClientError::from(RefreshRejection::Failed("x".into())),
            ClientError::RefreshFailed(_)
        ));
        assert!(matches!(
            ClientError::from(RefreshRejection::Cancelled),
            ClientError::RefreshFailed(_)
        ));
    }
}
