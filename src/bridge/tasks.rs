//! Cooperative tasks resumed once per frame.
//!
//! Tasks are `!Send` futures owned by the frame loop. Waking a task only
//! marks it ready; it is polled again the next time [`FrameTasks::run_ready`]
//! runs, never from inside the code that woke it.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Wake, Waker};

type LocalTask = Pin<Box<dyn Future<Output = ()>>>;

/// Handle to a spawned task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

type ReadyQueue = Arc<Mutex<VecDeque<TaskId>>>;

struct TaskWaker {
    id: TaskId,
    ready: ReadyQueue,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.ready
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(self.id);
    }
}

/// Single-threaded task set driven by the frame loop.
#[derive(Default)]
pub struct FrameTasks {
    tasks: HashMap<TaskId, LocalTask>,
    ready: ReadyQueue,
    next_id: u64,
}

impl FrameTasks {
    /// Create an empty task set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `future` to start on the next [`run_ready`](Self::run_ready).
    pub fn spawn(&mut self, future: impl Future<Output = ()> + 'static) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.tasks.insert(id, Box::pin(future));
        self.mark_ready(id);
        id
    }

    fn mark_ready(&self, id: TaskId) {
        self.ready
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(id);
    }

    /// Poll every task that was woken before this call. Returns how many ran.
    ///
    /// Tasks woken while this runs wait for the next call.
    pub fn run_ready(&mut self) -> usize {
        let batch: Vec<TaskId> = self
            .ready
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        let mut seen = HashSet::new();
        let mut resumed = 0;
        for id in batch {
            if !seen.insert(id) {
                continue;
            }
            let Some(task) = self.tasks.get_mut(&id) else {
                continue;
            };
            let waker = Waker::from(Arc::new(TaskWaker {
                id,
                ready: Arc::clone(&self.ready),
            }));
            let mut cx = Context::from_waker(&waker);
            resumed += 1;
            if task.as_mut().poll(&mut cx).is_ready() {
                self.tasks.remove(&id);
            }
        }
        resumed
    }

    /// Whether `id` has not finished yet.
    pub fn is_running(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    /// Number of unfinished tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether every task has finished.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
