//! Background thread hosting a data service backend
//!
//! `ThreadedService` runs a [`RequestHandler`] on a dedicated thread and talks
//! to it over two channels, so the frame loop can submit and poll without ever
//! blocking on the backend.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use super::NativeService;
use super::types::{NULL_REQUEST_ID, RequestId, RequestKind, ResponseBody, ResponseEnvelope};
use crate::constants::{FIRST_REQUEST_ID, SERVICE_THREAD_NAME};
use crate::error::ServiceError;

/// Backend that actually resolves requests. Runs on the service thread.
pub trait RequestHandler: Send + 'static {
    /// Called once on the service thread before the first request.
    fn start(&mut self) -> Result<(), ServiceError> {
        Ok(())
    }

    /// Resolve one request. `Ok(None)` sends no response.
    ///
    /// An error is fatal: the thread stops and the error is reported through
    /// [`NativeService::take_fatal_error`].
    fn handle(&mut self, request: RequestKind) -> Result<Option<ResponseBody>, ServiceError>;
}

/// Message sent to the service thread.
enum MessageToWorker {
    /// Stop as soon as possible, dropping queued requests
    End,
    Request {
        request_id: RequestId,
        kind: RequestKind,
    },
}

/// Message sent back from the service thread.
enum MessageFromWorker {
    /// The thread exited cleanly
    Done,
    /// The thread stopped because the backend failed
    FatalError(String),
    Response(ResponseEnvelope),
}

struct Connection {
    to_worker_tx: Sender<MessageToWorker>,
    from_worker_rx: Receiver<MessageFromWorker>,
    thread_handle: Option<JoinHandle<()>>,
}

impl Connection {
    fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            match handle.join() {
                Ok(()) => log::debug!("Joined gallery service thread"),
                Err(e) => log::warn!("Gallery service thread panicked: {:?}", e),
            }
        }
    }
}

/// [`NativeService`] backed by a handler running on its own thread.
pub struct ThreadedService {
    connection: Option<Connection>,
    next_request_id: RequestId,
    fatal_error: Option<String>,
}

impl ThreadedService {
    /// Spawn the service thread for `handler`.
    pub fn connect<H: RequestHandler>(handler: H) -> Result<Self, ServiceError> {
        let (to_worker_tx, to_worker_rx) = mpsc::channel::<MessageToWorker>();
        let (from_worker_tx, from_worker_rx) = mpsc::channel::<MessageFromWorker>();

        let thread_handle = thread::Builder::new()
            .name(SERVICE_THREAD_NAME.to_string())
            .spawn(move || {
                log::info!("Gallery service thread started");
                if let Err(err) = service_loop(handler, &to_worker_rx, &from_worker_tx) {
                    log::error!("Gallery service thread errored: {}", err);
                    let _ = from_worker_tx.send(MessageFromWorker::FatalError(err.to_string()));
                }
                log::info!("Gallery service thread exiting");
            })?;

        Ok(Self {
            connection: Some(Connection {
                to_worker_tx,
                from_worker_rx,
                thread_handle: Some(thread_handle),
            }),
            next_request_id: FIRST_REQUEST_ID,
            fatal_error: None,
        })
    }

    /// Whether the service thread is still reachable.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Ask the service thread to stop and wait for it.
    pub fn disconnect(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };
        if connection.to_worker_tx.send(MessageToWorker::End).is_err() {
            log::debug!("Gallery service thread already gone");
        }
        connection.join();
    }

    fn drop_connection(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.join();
        }
    }
}

impl NativeService for ThreadedService {
    fn submit(&mut self, request: RequestKind) -> RequestId {
        let Some(connection) = &self.connection else {
            return NULL_REQUEST_ID;
        };
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        let message = MessageToWorker::Request {
            request_id,
            kind: request,
        };
        if connection.to_worker_tx.send(message).is_err() {
            log::error!("Sending request {} to gallery service failed", request_id);
            return NULL_REQUEST_ID;
        }
        request_id
    }

    fn poll(&mut self) -> Option<ResponseEnvelope> {
        let connection = self.connection.as_ref()?;
        let message = match connection.from_worker_rx.try_recv() {
            Ok(message) => message,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                log::error!("Gallery service thread died without reporting");
                self.fatal_error = Some(ServiceError::Disconnected.to_string());
                self.drop_connection();
                return None;
            }
        };

        match message {
            MessageFromWorker::Response(envelope) => Some(envelope),
            MessageFromWorker::Done => {
                log::info!("Gallery service thread exited cleanly");
                self.drop_connection();
                None
            }
            MessageFromWorker::FatalError(message) => {
                log::error!("Gallery service encountered fatal error: {}", message);
                self.fatal_error = Some(message);
                self.drop_connection();
                None
            }
        }
    }

    fn take_fatal_error(&mut self) -> Option<String> {
        self.fatal_error.take()
    }
}

impl Drop for ThreadedService {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Move everything waiting in the channel into `queue`, blocking only when
/// the queue is empty. `End` (or a hung-up client) jumps to the front.
fn fill_queue(queue: &mut VecDeque<MessageToWorker>, rx: &Receiver<MessageToWorker>) {
    if queue.is_empty() {
        match rx.recv() {
            Ok(MessageToWorker::End) | Err(_) => {
                queue.push_front(MessageToWorker::End);
                return;
            }
            Ok(message) => queue.push_back(message),
        }
    }
    loop {
        match rx.try_recv() {
            Err(TryRecvError::Empty) => return,
            Ok(MessageToWorker::End) | Err(TryRecvError::Disconnected) => {
                queue.push_front(MessageToWorker::End);
                return;
            }
            Ok(message) => queue.push_back(message),
        }
    }
}

fn service_loop<H: RequestHandler>(
    mut handler: H,
    rx: &Receiver<MessageToWorker>,
    tx: &Sender<MessageFromWorker>,
) -> Result<(), ServiceError> {
    handler.start()?;
    let mut queue = VecDeque::new();
    loop {
        fill_queue(&mut queue, rx);
        let Some(message) = queue.pop_front() else {
            continue;
        };
        match message {
            MessageToWorker::End => {
                log::debug!(
                    "Gallery service stopping, dropping {} queued requests",
                    queue.len()
                );
                break;
            }
            MessageToWorker::Request { request_id, kind } => {
                log::trace!("Handling request {} ({})", request_id, kind.name());
                if let Some(body) = handler.handle(kind)? {
                    let response = MessageFromWorker::Response(ResponseEnvelope { request_id, body });
                    if tx.send(response).is_err() {
                        log::debug!("Client hung up, response {} dropped", request_id);
                    }
                }
            }
        }
    }
    // Nothing useful to do if the client is already gone.
    let _ = tx.send(MessageFromWorker::Done);
    Ok(())
}
