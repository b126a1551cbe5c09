//! Contract with the out-of-thread gallery data service.
//!
//! The frame loop only ever talks to the service through [`NativeService`],
//! whose methods never block.

mod threaded;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use threaded::{RequestHandler, ThreadedService};
pub use types::{
    ArtObjectId, ImageSize, NULL_REQUEST_ID, ObjectRecord, RequestId, RequestKind, ResponseBody,
    ResponseEnvelope, to_optional_filter,
};

/// Non-blocking request/response channel to the data service.
pub trait NativeService {
    /// Send a request. Returns [`NULL_REQUEST_ID`] if it could not be sent.
    fn submit(&mut self, request: RequestKind) -> RequestId;

    /// Take the next available response, if any.
    fn poll(&mut self) -> Option<ResponseEnvelope>;

    /// Take the pending fatal error message. One-shot.
    fn take_fatal_error(&mut self) -> Option<String>;
}
