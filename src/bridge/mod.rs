//! Frame-loop side of the asset bridge.
//!
//! Everything here runs on the frame-loop thread. Callers submit requests
//! through a [`ClientHandle`] or hand sources to a [`DecoderHandle`], then
//! await the returned futures inside tasks spawned on the [`GalleryBridge`].
//! Those futures only ever resolve during [`GalleryBridge::tick`].

mod client;
mod completion;
mod dispatcher;
mod registry;
mod tasks;


use std::cell::{RefCell, RefMut};
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::rc::Rc;

pub use client::{GalleryClient, Reply};
pub use completion::{Completer, Completion, completion_pair};
pub use dispatcher::{DrainBudget, DrainReport, ResponseDispatcher};
pub use registry::{PendingRequest, RequestRegistry};
pub use tasks::{FrameTasks, TaskId};

use crate::config::BridgeConfig;
use crate::decode::{DecodeSource, DecodedImage, ImageDecodeWorker, JobId};
use crate::service::{ArtObjectId, ImageSize, NativeService, ObjectRecord, RequestKind};

/// Shared handle on the gallery client, usable from inside tasks.
///
/// Each call borrows the client only for the duration of the submission.
pub struct ClientHandle<S: NativeService> {
    inner: Rc<RefCell<GalleryClient<S>>>,
}

impl<S: NativeService> Clone for ClientHandle<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: NativeService> ClientHandle<S> {
    fn new(client: GalleryClient<S>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(client)),
        }
    }

    fn borrow_mut(&self) -> RefMut<'_, GalleryClient<S>> {
        self.inner.borrow_mut()
    }

    /// Run `f` with exclusive access to the client.
    pub fn with<R>(&self, f: impl FnOnce(&mut GalleryClient<S>) -> R) -> R {
        f(&mut self.borrow_mut())
    }

    /// Submit a raw request.
    pub fn begin(&self, kind: RequestKind) -> PendingRequest {
        self.borrow_mut().begin(kind)
    }

    /// See [`GalleryClient::fetch_image`].
    pub fn fetch_image(&self, object_id: ArtObjectId, size: ImageSize) -> Reply<Option<PathBuf>> {
        self.borrow_mut().fetch_image(object_id, size)
    }

    /// See [`GalleryClient::query_objects_for_wall`].
    pub fn query_objects_for_wall(&self, gallery_id: i64, wall_id: &str) -> Reply<Vec<ObjectRecord>> {
        self.borrow_mut().query_objects_for_wall(gallery_id, wall_id)
    }

    /// See [`GalleryClient::count_objects`].
    pub fn count_objects(&self, filter: &str) -> Reply<i64> {
        self.borrow_mut().count_objects(filter)
    }

    /// See [`GalleryClient::run_layout`].
    pub fn run_layout(&self, walls_json: String, filter: &str, dense: bool) -> Reply<bool> {
        self.borrow_mut().run_layout(walls_json, filter, dense)
    }

    /// See [`GalleryClient::migrate`].
    pub fn migrate(&self) -> Reply<bool> {
        self.borrow_mut().migrate()
    }

    /// See [`GalleryClient::import_non_positive_layout`].
    pub fn import_non_positive_layout(&self, json_content: String) -> Reply<bool> {
        self.borrow_mut().import_non_positive_layout(json_content)
    }

    /// See [`GalleryClient::export_non_positive_layout`].
    pub fn export_non_positive_layout(&self) -> Reply<String> {
        self.borrow_mut().export_non_positive_layout()
    }

    /// See [`GalleryClient::move_art_object`].
    pub fn move_art_object(
        &self,
        object_id: ArtObjectId,
        gallery_id: i64,
        wall_id: &str,
        x: f64,
        y: f64,
    ) -> bool {
        self.borrow_mut()
            .move_art_object(object_id, gallery_id, wall_id, x, y)
    }

    /// Number of requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.inner.borrow().registry().len()
    }
}

struct DecodeQueue {
    worker: ImageDecodeWorker,
    waiters: HashMap<JobId, Completer<DecodedImage>>,
}

impl DecodeQueue {
    /// Resolve up to `max` finished jobs. Returns how many were taken.
    fn collect(&mut self, max: usize) -> usize {
        let mut collected = 0;
        while collected < max {
            let Some(job) = self.worker.take_completed() else {
                break;
            };
            collected += 1;
            let Some(waiter) = self.waiters.remove(&job.id) else {
                log::debug!("Decode job {} finished with no waiter", job.id);
                continue;
            };
            match job.result {
                Some(image) => waiter.fulfill(image),
                // Dropping the waiter resolves the caller with `None`.
                None => drop(waiter),
            }
        }
        collected
    }
}

/// Shared handle on the decode worker, usable from inside tasks.
#[derive(Clone)]
pub struct DecoderHandle {
    inner: Rc<RefCell<DecodeQueue>>,
}

impl DecoderHandle {
    fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(DecodeQueue {
                worker: ImageDecodeWorker::new(),
                waiters: HashMap::new(),
            })),
        }
    }

    /// Decode `source` in the background.
    ///
    /// Resolves to `None` if the source cannot be decoded or the worker has
    /// been shut down.
    pub fn decode(&self, source: DecodeSource) -> Completion<DecodedImage> {
        let mut queue = self.inner.borrow_mut();
        let job = queue.worker.new_job(source);
        let (completer, completion) = completion_pair();
        queue.waiters.insert(job.id, completer);
        queue.worker.enqueue(job);
        completion
    }

    /// Number of decodes still waiting for a result.
    pub fn pending_decodes(&self) -> usize {
        self.inner.borrow().waiters.len()
    }

    /// Whether the worker thread is up.
    pub fn is_running(&self) -> bool {
        self.inner.borrow().worker.is_running()
    }

    fn collect(&self, max: usize) -> usize {
        self.inner.borrow_mut().collect(max)
    }

    fn shutdown(&self) {
        let mut queue = self.inner.borrow_mut();
        queue.worker.shutdown();
        let remaining = queue.worker.completed_count();
        queue.collect(remaining);
        queue.waiters.clear();
    }
}

/// Callback that presents a fatal service error to the user.
///
/// Runs from [`GalleryBridge::tick`] after the client has been released, so
/// it may use a [`ClientHandle`] freely.
pub type FatalErrorReporter = Box<dyn FnMut(&str)>;

/// What one [`GalleryBridge::tick`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Frame number, starting at 1
    pub frame: u64,
    /// Response drain for this frame
    pub drain: DrainReport,
    /// Decode jobs collected
    pub decoded: usize,
    /// Tasks resumed
    pub resumed: usize,
}

/// Owns the client, the decode worker and the task set, and advances all of
/// them once per frame.
pub struct GalleryBridge<S: NativeService> {
    client: ClientHandle<S>,
    decoder: DecoderHandle,
    tasks: FrameTasks,
    on_fatal: Option<FatalErrorReporter>,
    decode_results_per_tick: usize,
    frame: u64,
}

impl<S: NativeService> GalleryBridge<S> {
    /// Wrap `service`, taking budgets and limits from `config`.
    pub fn new(service: S, config: &BridgeConfig) -> Self {
        Self {
            client: ClientHandle::new(GalleryClient::new(service, config.drain_budget())),
            decoder: DecoderHandle::new(),
            tasks: FrameTasks::new(),
            on_fatal: None,
            decode_results_per_tick: config.decode_results_per_tick.max(1),
            frame: 0,
        }
    }

    /// Install the collaborator that presents fatal service errors.
    pub fn set_fatal_reporter(&mut self, reporter: impl FnMut(&str) + 'static) {
        self.on_fatal = Some(Box::new(reporter));
    }

    /// Handle for submitting requests.
    pub fn client(&self) -> ClientHandle<S> {
        self.client.clone()
    }

    /// Handle for background decodes.
    pub fn decoder(&self) -> DecoderHandle {
        self.decoder.clone()
    }

    /// Queue a task; it first runs on the next tick.
    pub fn spawn(&mut self, task: impl Future<Output = ()> + 'static) -> TaskId {
        self.tasks.spawn(task)
    }

    /// Whether every spawned task has finished.
    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Advance one frame: drain responses, collect decodes, resume tasks.
    pub fn tick(&mut self) -> TickReport {
        self.frame += 1;
        let drain = self.client.with(|client| client.drain_one_frame());
        if let Some(message) = drain.fatal_error.as_deref() {
            match self.on_fatal.as_mut() {
                Some(reporter) => reporter(message),
                None => log::warn!("No fatal error reporter installed"),
            }
        }
        let decoded = self.decoder.collect(self.decode_results_per_tick);
        let resumed = self.tasks.run_ready();
        if drain.dispatched > 0 || decoded > 0 {
            log::trace!(
                "Frame {}: {} responses, {} decodes, {} tasks resumed",
                self.frame,
                drain.dispatched,
                decoded,
                resumed
            );
        }
        TickReport {
            frame: self.frame,
            drain,
            decoded,
            resumed,
        }
    }

    /// Stop the decode worker. Outstanding decodes resolve to `None` on the
    /// next tick; the service is left untouched.
    pub fn shutdown(&mut self) {
        self.decoder.shutdown();
    }
}

impl<S: NativeService> Drop for GalleryBridge<S> {
    fn drop(&mut self) {
        self.decoder.shutdown();
    }
}
