//! Single-assignment result slot shared between a waiting caller and the
//! frame-loop step that resolves it.
//!
//! The slot is `Rc`-based and therefore pinned to the frame-loop thread: it can
//! only be fulfilled, abandoned, or awaited from there.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

enum SlotState<T> {
    Pending,
    Ready(T),
    /// Value already handed to the caller
    Taken,
    /// Producer went away without a value
    Abandoned,
    /// Never submitted; resolves empty after one yield
    Failed { yielded: bool },
}

struct Slot<T> {
    state: SlotState<T>,
    waker: Option<Waker>,
}

/// Awaiting side of the slot. Resolves to `None` if the value never arrives.
pub struct Completion<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

/// Producing side of the slot. Dropping it unfulfilled abandons the slot.
pub struct Completer<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

/// Create a linked completer/completion pair.
pub fn completion_pair<T>() -> (Completer<T>, Completion<T>) {
    let slot = Rc::new(RefCell::new(Slot {
        state: SlotState::Pending,
        waker: None,
    }));
    (
        Completer {
            slot: Rc::clone(&slot),
        },
        Completion { slot },
    )
}

impl<T> Completion<T> {
    /// A completion whose operation was never started.
    pub fn failed() -> Self {
        Self {
            slot: Rc::new(RefCell::new(Slot {
                state: SlotState::Failed { yielded: false },
                waker: None,
            })),
        }
    }

    /// Whether the value is still outstanding.
    pub fn is_pending(&self) -> bool {
        matches!(self.slot.borrow().state, SlotState::Pending)
    }
}

impl<T> Future for Completion<T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.borrow_mut();
        match std::mem::replace(&mut slot.state, SlotState::Taken) {
            SlotState::Pending => {
                slot.state = SlotState::Pending;
                let stale = slot
                    .waker
                    .as_ref()
                    .is_none_or(|waker| !waker.will_wake(cx.waker()));
                if stale {
                    slot.waker = Some(cx.waker().clone());
                }
                Poll::Pending
            }
            SlotState::Ready(value) => Poll::Ready(Some(value)),
            SlotState::Taken => Poll::Ready(None),
            SlotState::Abandoned => {
                slot.state = SlotState::Abandoned;
                Poll::Ready(None)
            }
            SlotState::Failed { yielded: false } => {
                slot.state = SlotState::Failed { yielded: true };
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            SlotState::Failed { yielded: true } => Poll::Ready(None),
        }
    }
}

impl<T> Completer<T> {
    /// Deposit the value and wake the waiting caller.
    pub fn fulfill(self, value: T) {
        self.resolve(SlotState::Ready(value));
    }

    fn resolve(&self, state: SlotState<T>) {
        let waker = {
            let mut slot = self.slot.borrow_mut();
            if !matches!(slot.state, SlotState::Pending) {
                return;
            }
            slot.state = state;
            slot.waker.take()
        };
        // Wake outside the borrow; the waker may poll synchronously.
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        self.resolve(SlotState::Abandoned);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poll_once<F: Future + Unpin>(future: &mut F) -> Poll<F::Output> {
        let mut cx = Context::from_waker(Waker::noop());
        Pin::new(future).poll(&mut cx)
    }

    #[test]
    fn test_fulfilled_value_is_delivered_once() {
        let (completer, mut completion) = completion_pair::<u32>();
        assert!(poll_once(&mut completion).is_pending());
        assert!(completion.is_pending());
        completer.fulfill(7);
        assert!(!completion.is_pending());
        assert_eq!(poll_once(&mut completion), Poll::Ready(Some(7)));
    }

    #[test]
    fn test_dropped_completer_abandons() {
        let (completer, mut completion) = completion_pair::<u32>();
        drop(completer);
        assert_eq!(poll_once(&mut completion), Poll::Ready(None));
        assert_eq!(poll_once(&mut completion), Poll::Ready(None));
    }

    #[test]
    fn test_failed_yields_once_then_resolves_empty() {
        let mut completion = Completion::<u32>::failed();
        assert!(poll_once(&mut completion).is_pending());
        assert_eq!(poll_once(&mut completion), Poll::Ready(None));
    }
}
