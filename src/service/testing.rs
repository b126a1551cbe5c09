//! Scripted in-memory service for tests.

use std::collections::VecDeque;
use std::time::Duration;

use super::NativeService;
use super::types::{NULL_REQUEST_ID, RequestId, RequestKind, ResponseBody, ResponseEnvelope};

/// Issues sequential ids and returns whatever responses the test queues.
#[derive(Default)]
pub(crate) struct ScriptedService {
    pub next_id: RequestId,
    pub reject_submissions: bool,
    pub submitted: Vec<(RequestId, RequestKind)>,
    pub responses: VecDeque<ResponseEnvelope>,
    pub fatal_error: Option<String>,
    pub poll_delay: Option<Duration>,
    pub polls: usize,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Default::default()
        }
    }

    /// Queue a response for `request_id`.
    pub fn respond(&mut self, request_id: RequestId, body: ResponseBody) {
        self.responses.push_back(ResponseEnvelope { request_id, body });
    }

    /// Answer every submitted request with `body`.
    pub fn respond_all(&mut self, body: ResponseBody) {
        let ids: Vec<RequestId> = self.submitted.iter().map(|(id, _)| *id).collect();
        for id in ids {
            self.respond(id, body.clone());
        }
    }
}

impl NativeService for ScriptedService {
    fn submit(&mut self, request: RequestKind) -> RequestId {
        if self.reject_submissions {
            return NULL_REQUEST_ID;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.submitted.push((id, request));
        id
    }

    fn poll(&mut self) -> Option<ResponseEnvelope> {
        self.polls += 1;
        if let Some(delay) = self.poll_delay {
            std::thread::sleep(delay);
        }
        self.responses.pop_front()
    }

    fn take_fatal_error(&mut self) -> Option<String> {
        self.fatal_error.take()
    }
}
