//! Background thread for image decoding.
//!
//! The worker owns two queues shared with the frame loop: pending jobs and
//! completed jobs, each behind its own lock. A counting signal wakes the
//! thread once per job so it sleeps while idle. The thread only produces CPU
//! pixel buffers; anything GPU-side happens back on the frame loop.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use super::job::{DecodeSource, ImageDecodeJob, JobId};
use crate::constants::DECODER_THREAD_NAME;

/// Counting wait/notify primitive.
#[derive(Default)]
struct Signal {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Signal {
    fn release(&self) {
        let mut permits = self.permits.lock().unwrap_or_else(PoisonError::into_inner);
        *permits += 1;
        self.available.notify_one();
    }

    fn acquire(&self) {
        let mut permits = self.permits.lock().unwrap_or_else(PoisonError::into_inner);
        while *permits == 0 {
            permits = self
                .available
                .wait(permits)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *permits -= 1;
    }
}

#[derive(Default)]
struct PendingJobs {
    /// Popped from the back: newest job first
    jobs: Vec<ImageDecodeJob>,
    exit: bool,
}

#[derive(Default)]
struct Shared {
    pending: Mutex<PendingJobs>,
    completed: Mutex<VecDeque<ImageDecodeJob>>,
    signal: Signal,
}

impl Shared {
    fn push_completed(&self, job: ImageDecodeJob) {
        self.completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(job);
    }

    /// Next job to decode, or `None` once the exit flag is set.
    fn pop_next(&self) -> Option<Option<ImageDecodeJob>> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.exit {
            return None;
        }
        Some(pending.jobs.pop())
    }
}

enum ThreadState {
    NotStarted,
    Running(JoinHandle<()>),
    ShutDown,
}

/// Decodes images on a single lazily started background thread.
///
/// All methods take `&self` and may be called from any thread, although the
/// frame loop is the expected caller.
pub struct ImageDecodeWorker {
    shared: Arc<Shared>,
    state: Mutex<ThreadState>,
    spawn_count: AtomicUsize,
    next_job_id: AtomicU64,
}

impl Default for ImageDecodeWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageDecodeWorker {
    /// Create a worker. The thread starts on the first [`enqueue`](Self::enqueue).
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            state: Mutex::new(ThreadState::NotStarted),
            spawn_count: AtomicUsize::new(0),
            next_job_id: AtomicU64::new(1),
        }
    }

    /// Build a job for `source` with a fresh id.
    pub fn new_job(&self, source: DecodeSource) -> ImageDecodeJob {
        let id = JobId(self.next_job_id.fetch_add(1, Ordering::Relaxed));
        ImageDecodeJob::new(id, source)
    }

    /// Queue `job` for decoding, starting the thread if needed.
    ///
    /// After [`shutdown`](Self::shutdown) (or if the thread cannot be
    /// spawned) the job goes straight to the completed queue with no result.
    pub fn enqueue(&self, job: ImageDecodeJob) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*state, ThreadState::NotStarted) {
            *state = match self.spawn_thread() {
                Ok(handle) => ThreadState::Running(handle),
                Err(e) => {
                    log::error!("Failed to spawn decoder thread: {}", e);
                    ThreadState::ShutDown
                }
            };
        }

        if matches!(*state, ThreadState::ShutDown) {
            drop(state);
            log::warn!("Decode job {} enqueued after shutdown, dropping it", job.id);
            self.shared.push_completed(job);
            return;
        }

        log::trace!("Enqueued decode job {} ({})", job.id, job.source);
        self.shared
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .jobs
            .push(job);
        drop(state);
        self.shared.signal.release();
    }

    fn spawn_thread(&self) -> std::io::Result<JoinHandle<()>> {
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(DECODER_THREAD_NAME.to_string())
            .spawn(move || {
                log::info!("Image decoder thread started");
                Self::thread_loop(&shared);
                log::info!("Image decoder thread exiting");
            })?;
        self.spawn_count.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    fn thread_loop(shared: &Shared) {
        loop {
            shared.signal.acquire();
            let Some(next) = shared.pop_next() else {
                break;
            };
            // Spurious signal: nothing left to decode
            let Some(mut job) = next else {
                continue;
            };
            job.run();
            shared.push_completed(job);
        }
    }

    /// Pop the oldest completed job without blocking.
    pub fn take_completed(&self) -> Option<ImageDecodeJob> {
        self.shared
            .completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    /// Stop and join the thread. Safe to call repeatedly.
    ///
    /// A worker that never started is left untouched and still starts on the
    /// next [`enqueue`](Self::enqueue). Jobs still pending are moved to the
    /// completed queue undecoded.
    pub fn shutdown(&self) {
        let handle = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match std::mem::replace(&mut *state, ThreadState::ShutDown) {
                ThreadState::Running(handle) => handle,
                other => {
                    *state = other;
                    return;
                }
            }
        };

        log::debug!("Shutting down image decoder thread");
        self.shared
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .exit = true;
        self.shared.signal.release();
        if let Err(e) = handle.join() {
            log::warn!("Decoder thread panicked: {:?}", e);
        }

        let leftover = std::mem::take(
            &mut self
                .shared
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .jobs,
        );
        if !leftover.is_empty() {
            log::debug!("{} decode jobs abandoned at shutdown", leftover.len());
        }
        for job in leftover {
            self.shared.push_completed(job);
        }
    }

    /// Whether the thread has been started and not shut down.
    pub fn is_running(&self) -> bool {
        matches!(
            *self.state.lock().unwrap_or_else(PoisonError::into_inner),
            ThreadState::Running(_)
        )
    }

    /// How many times a decoder thread has been spawned (0 or 1).
    pub fn spawn_count(&self) -> usize {
        self.spawn_count.load(Ordering::SeqCst)
    }

    /// Jobs waiting for the thread.
    pub fn pending_count(&self) -> usize {
        self.shared
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .jobs
            .len()
    }

    /// Jobs waiting for [`take_completed`](Self::take_completed).
    pub fn completed_count(&self) -> usize {
        self.shared
            .completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Drop for ImageDecodeWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::job::tests::png_bytes;
    use std::time::{Duration, Instant};

    fn wait_for_completed(worker: &ImageDecodeWorker) -> ImageDecodeJob {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(job) = worker.take_completed() {
                return job;
            }
            assert!(Instant::now() < deadline, "decode timed out");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_thread_starts_lazily_once() {
        let worker = ImageDecodeWorker::new();
        assert!(!worker.is_running());
        assert_eq!(worker.spawn_count(), 0);

        worker.enqueue(worker.new_job(DecodeSource::Bytes(png_bytes(2, 2))));
        worker.enqueue(worker.new_job(DecodeSource::Bytes(png_bytes(2, 2))));
        assert!(worker.is_running());
        assert_eq!(worker.spawn_count(), 1);

        wait_for_completed(&worker);
        wait_for_completed(&worker);
        worker.shutdown();
        assert_eq!(worker.spawn_count(), 1);
    }

    #[test]
    fn test_decodes_in_background() {
        let worker = ImageDecodeWorker::new();
        let job = worker.new_job(DecodeSource::Bytes(png_bytes(5, 3)));
        let id = job.id;
        worker.enqueue(job);
        let done = wait_for_completed(&worker);
        assert_eq!(done.id, id);
        let image = done.result.expect("decoded");
        assert_eq!((image.width, image.height), (5, 3));
    }

    #[test]
    fn test_failed_decode_yields_empty_result() {
        let worker = ImageDecodeWorker::new();
        worker.enqueue(worker.new_job(DecodeSource::Bytes(b"not an image".to_vec())));
        worker.enqueue(worker.new_job(DecodeSource::Bytes(png_bytes(1, 1))));
        let mut results: Vec<bool> = (0..2)
            .map(|_| wait_for_completed(&worker).result.is_some())
            .collect();
        results.sort();
        assert_eq!(results, vec![false, true]);
    }

    #[test]
    fn test_take_completed_is_non_blocking() {
        let worker = ImageDecodeWorker::new();
        assert!(worker.take_completed().is_none());
        assert_eq!(worker.completed_count(), 0);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let never_started = ImageDecodeWorker::new();
        never_started.shutdown();
        never_started.shutdown();
        assert_eq!(never_started.spawn_count(), 0);
        assert!(!never_started.is_running());

        let worker = ImageDecodeWorker::new();
        worker.enqueue(worker.new_job(DecodeSource::Bytes(png_bytes(1, 1))));
        worker.shutdown();
        worker.shutdown();
        assert!(!worker.is_running());
    }

    #[test]
    fn test_enqueue_after_shutdown_completes_empty() {
        let worker = ImageDecodeWorker::new();
        worker.enqueue(worker.new_job(DecodeSource::Bytes(png_bytes(1, 1))));
        worker.shutdown();
        while worker.take_completed().is_some() {}

        let job = worker.new_job(DecodeSource::Bytes(png_bytes(1, 1)));
        let id = job.id;
        worker.enqueue(job);
        assert_eq!(worker.spawn_count(), 1);
        assert!(!worker.is_running());
        let done = worker.take_completed().expect("completed immediately");
        assert_eq!(done.id, id);
        assert!(done.result.is_none());
    }

    #[test]
    fn test_shutdown_before_first_job_is_a_no_op() {
        let worker = ImageDecodeWorker::new();
        worker.shutdown();
        worker.enqueue(worker.new_job(DecodeSource::Bytes(png_bytes(2, 3))));
        assert_eq!(worker.spawn_count(), 1);

        let done = wait_for_completed(&worker);
        let image = done.result.expect("decoded after early shutdown");
        assert_eq!((image.width, image.height), (2, 3));
        worker.shutdown();
    }

    #[test]
    fn test_pending_jobs_pop_newest_first() {
        let shared = Shared::default();
        {
            let mut pending = shared.pending.lock().unwrap();
            for id in 1..=3 {
                pending
                    .jobs
                    .push(ImageDecodeJob::new(JobId(id), DecodeSource::Bytes(Vec::new())));
            }
        }
        let order: Vec<u64> = std::iter::from_fn(|| shared.pop_next().flatten())
            .map(|job| job.id.0)
            .collect();
        assert_eq!(order, vec![3, 2, 1]);

        shared.pending.lock().unwrap().exit = true;
        assert!(shared.pop_next().is_none());
    }

    #[test]
    fn test_signal_counts_releases() {
        let signal = Signal::default();
        signal.release();
        signal.release();
        signal.acquire();
        signal.acquire();
        assert_eq!(*signal.permits.lock().unwrap(), 0);
    }

    #[test]
    fn test_job_ids_are_unique() {
        let worker = ImageDecodeWorker::new();
        let a = worker.new_job(DecodeSource::Bytes(Vec::new()));
        let b = worker.new_job(DecodeSource::Bytes(Vec::new()));
        assert_ne!(a.id, b.id);
    }
}
