//! In-flight request tracking.
//!
//! Each invocation registers a [`PendingRequest`] holding the sending half of a oneshot
//! channel; the caller holds the receiving half wrapped in a [`PendingResponse`].
//! Completing an id removes its entry from the table before the continuation fires,
//! so an id can be settled at most once and no table lock is held while the caller
//! resumes.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use tokio::sync::oneshot;

use crate::bridge::protocol::RequestId;
use crate::error::BridgeError;

pub(crate) type Outcome = Result<serde_json::Value, BridgeError>;

/// One outstanding invocation.
pub struct PendingRequest {
    operation: &'static str,
    message: String,
    responder: oneshot::Sender<Outcome>,
}

impl PendingRequest {
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Serialized envelope that was posted to the host.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn resolve(self, id: RequestId, result: serde_json::Value) {
        self.settle(id, Ok(result));
    }

    pub(crate) fn reject(self, id: RequestId, error: BridgeError) {
        self.settle(id, Err(error));
    }

    fn settle(self, id: RequestId, outcome: Outcome) {
        if self.responder.send(outcome).is_err() {
            tracing::debug!(
                %id,
                operation = self.operation,
                "Caller dropped response before completion"
            );
        }
    }
}

/// Table of requests posted to the host and not yet completed.
#[derive(Default)]
pub struct PendingTable {
    requests: DashMap<RequestId, PendingRequest>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` and return the receiving half of its continuation.
    pub(crate) fn register(
        &self,
        id: RequestId,
        operation: &'static str,
        message: String,
    ) -> oneshot::Receiver<Outcome> {
        let (responder, rx) = oneshot::channel();
        let request = PendingRequest {
            operation,
            message,
            responder,
        };
        if self.requests.insert(id, request).is_some() {
            // The displaced caller observes Abandoned.
            tracing::error!(%id, "Request id registered twice");
        }
        rx
    }

    /// Remove and return the entry for `id`, if still pending.
    pub fn take(&self, id: RequestId) -> Option<PendingRequest> {
        self.requests.remove(&id).map(|(_, request)| request)
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.requests.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// Caller-side future for one request, resolving to the decoded host result.
///
/// The request is already posted when this value is created; awaiting it only waits
/// for the host's completion. Dropping it discards the answer but leaves the table
/// entry in place until the host completes the id.
#[must_use = "dropping a PendingResponse discards the host's answer"]
pub struct PendingResponse<T> {
    id: RequestId,
    rx: oneshot::Receiver<Outcome>,
    _result: PhantomData<fn() -> T>,
}

impl<T> PendingResponse<T> {
    pub(crate) fn new(id: RequestId, rx: oneshot::Receiver<Outcome>) -> Self {
        Self {
            id,
            rx,
            _result: PhantomData,
        }
    }

    /// A response that is already rejected, for failures before registration.
    pub(crate) fn failed(id: RequestId, error: BridgeError) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(error));
        Self::new(id, rx)
    }

    pub fn id(&self) -> RequestId {
        self.id
    }
}

impl<T: DeserializeOwned> Future for PendingResponse<T> {
    type Output = Result<T, BridgeError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let id = this.id;
        let outcome = match Pin::new(&mut this.rx).poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Ok(outcome)) => outcome,
            Poll::Ready(Err(_)) => Err(BridgeError::Abandoned(id)),
        };
        Poll::Ready(outcome.and_then(|value| {
            serde_json::from_value(value).map_err(|source| BridgeError::Decode { id, source })
        }))
    }
}
