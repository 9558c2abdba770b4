//! Observable holder for the outcome of a single request.
//!
//! # Design
//! A `RequestHandle` starts `Pending` and settles exactly once, to either
//! `Ready` or `Failed`. The state lives in a `tokio::sync::watch` channel, so
//! a UI layer (or anything else) can `subscribe` and react to the
//! transition, while callers that only want the result `await` `settled()`.
//! Data and error travel through the same channel; there is no field that
//! changes without observers being notified.

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::RequestError;

/// Lifecycle of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState<T> {
    Pending,
    Ready(T),
    Failed(RequestError),
}

impl<T> RequestState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, RequestState::Pending)
    }
}

/// Shared, observable result of one request. Cloning yields another view of
/// the same request.
#[derive(Debug)]
pub struct RequestHandle<T> {
    state: Arc<watch::Sender<RequestState<T>>>,
}

impl<T> Clone for RequestHandle<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Default for RequestHandle<T> {
    fn default() -> Self {
        Self::pending()
    }
}

impl<T> RequestHandle<T> {
    /// A fresh handle that has not settled yet.
    pub fn pending() -> Self {
        let (tx, _rx) = watch::channel(RequestState::Pending);
        Self { state: Arc::new(tx) }
    }

    pub fn is_pending(&self) -> bool {
        self.state.borrow().is_pending()
    }

    /// Receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<RequestState<T>> {
        self.state.subscribe()
    }

    /// Settle the handle. Returns `false` if it had already settled, in
    /// which case the state is left untouched.
    pub(crate) fn settle(&self, result: Result<T, RequestError>) -> bool {
        let mut result = Some(result);
        self.state.send_if_modified(|state| {
            if !state.is_pending() {
                return false;
            }
            *state = match result.take() {
                Some(Ok(data)) => RequestState::Ready(data),
                Some(Err(err)) => RequestState::Failed(err),
                None => return false,
            };
            true
        })
    }
}

impl<T: Clone> RequestHandle<T> {
    pub fn state(&self) -> RequestState<T> {
        self.state.borrow().clone()
    }

    /// Response payload, once the request succeeded.
    pub fn data(&self) -> Option<T> {
        match &*self.state.borrow() {
            RequestState::Ready(data) => Some(data.clone()),
            _ => None,
        }
    }

    /// Failure, once the request failed.
    pub fn error(&self) -> Option<RequestError> {
        match &*self.state.borrow() {
            RequestState::Failed(err) => Some(err.clone()),
            _ => None,
        }
    }

    /// Wait until the request settles and return its outcome.
    pub async fn settled(&self) -> Result<T, RequestError> {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let state = rx
            .wait_for(|state| !state.is_pending())
            .await
            .map_err(|_| RequestError::Aborted)?;
        match &*state {
            RequestState::Ready(data) => Ok(data.clone()),
            RequestState::Failed(err) => Err(err.clone()),
            RequestState::Pending => Err(RequestError::Aborted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_pending_without_data_or_error() {
        let handle: RequestHandle<String> = RequestHandle::pending();
        assert!(handle.is_pending());
        assert!(handle.data().is_none());
        assert!(handle.error().is_none());
    }

    #[test]
    fn settles_once_with_data() {
        let handle = RequestHandle::pending();
        assert!(handle.settle(Ok(7)));
        assert!(!handle.is_pending());
        assert_eq!(handle.data(), Some(7));
        assert!(handle.error().is_none());

        assert!(!handle.settle(Err(RequestError::Timeout)));
        assert_eq!(handle.state(), RequestState::Ready(7));
    }

    #[test]
    fn settles_with_error_and_no_data() {
        let handle: RequestHandle<u8> = RequestHandle::pending();
        handle.settle(Err(RequestError::EmptyBody { status: 200 }));
        assert!(!handle.is_pending());
        assert!(handle.data().is_none());
        assert_eq!(handle.error(), Some(RequestError::EmptyBody { status: 200 }));
    }

    #[test]
    fn clones_share_state() {
        let handle = RequestHandle::pending();
        let view = handle.clone();
        handle.settle(Ok("done"));
        assert_eq!(view.data(), Some("done"));
    }

    #[tokio::test]
    async fn subscribers_see_the_transition() {
        let handle = RequestHandle::pending();
        let mut rx = handle.subscribe();
        assert!(rx.borrow_and_update().is_pending());

        handle.settle(Ok(1));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), RequestState::Ready(1));
    }

    #[tokio::test]
    async fn settled_waits_for_a_later_settlement() {
        let handle: RequestHandle<u32> = RequestHandle::pending();
        let settler = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            settler.settle(Err(RequestError::Timeout));
        });
        assert_eq!(handle.settled().await, Err(RequestError::Timeout));
    }

    #[tokio::test]
    async fn settled_returns_immediately_when_already_done() {
        let handle = RequestHandle::pending();
        handle.settle(Ok(vec![1, 2]));
        assert_eq!(handle.settled().await, Ok(vec![1, 2]));
    }
}
