//! Table of in-flight requests, keyed by the id the service issued.
//!
//! Frame-loop only. Each live id owns the producing half of a
//! [`Completion`], so removing an entry either delivers its payload or
//! abandons the waiting caller.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::completion::{Completer, Completion, completion_pair};
use crate::service::{
    NULL_REQUEST_ID, NativeService, RequestId, RequestKind, ResponseBody, ResponseEnvelope,
};

/// Caller's handle on a submitted request.
///
/// Awaiting it yields the response payload, or `None` if the request failed
/// to submit or was abandoned by a fatal service error.
pub struct PendingRequest {
    id: RequestId,
    kind: &'static str,
    completion: Completion<ResponseBody>,
}

impl PendingRequest {
    /// Id issued by the service, or [`NULL_REQUEST_ID`] if submission failed.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Short name of the request kind.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Whether submission failed and the request was never registered.
    pub fn failed_immediately(&self) -> bool {
        self.id == NULL_REQUEST_ID
    }

    /// Whether the payload is still outstanding.
    pub fn is_pending(&self) -> bool {
        self.completion.is_pending()
    }
}

impl Future for PendingRequest {
    type Output = Option<ResponseBody>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.completion).poll(cx)
    }
}

struct PendingEntry {
    kind: &'static str,
    completer: Completer<ResponseBody>,
}

/// Maps live request ids to their waiting callers.
#[derive(Default)]
pub struct RequestRegistry {
    pending: HashMap<RequestId, PendingEntry>,
}

impl RequestRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit `kind` and register the returned id.
    ///
    /// If the service rejects the submission, the request is not registered
    /// and the returned handle resolves to `None` after one yield.
    pub fn begin<S: NativeService + ?Sized>(
        &mut self,
        service: &mut S,
        kind: RequestKind,
    ) -> PendingRequest {
        let name = kind.name();
        let id = service.submit(kind);
        if id == NULL_REQUEST_ID {
            log::warn!("Submitting {} request failed", name);
            return PendingRequest {
                id,
                kind: name,
                completion: Completion::failed(),
            };
        }

        let (completer, completion) = completion_pair();
        let entry = PendingEntry {
            kind: name,
            completer,
        };
        if let Some(previous) = self.pending.insert(id, entry) {
            log::warn!(
                "Service reused request id {} ({} replaced {}), abandoning the older caller",
                id,
                name,
                previous.kind
            );
        }
        log::trace!("Registered {} request {}", name, id);
        PendingRequest {
            id,
            kind: name,
            completion,
        }
    }

    /// Deliver a response to its caller and forget the id.
    ///
    /// Hands the envelope back if no request with that id is pending.
    pub fn fulfill(&mut self, envelope: ResponseEnvelope) -> Result<(), ResponseEnvelope> {
        match self.pending.remove(&envelope.request_id) {
            Some(entry) => {
                log::trace!(
                    "Fulfilled {} request {} with {} payload",
                    entry.kind,
                    envelope.request_id,
                    envelope.body.shape()
                );
                entry.completer.fulfill(envelope.body);
                Ok(())
            }
            None => Err(envelope),
        }
    }

    /// Abandon every pending request. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    /// Whether `id` is still waiting for a response.
    pub fn contains(&self, id: RequestId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Number of in-flight requests.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
