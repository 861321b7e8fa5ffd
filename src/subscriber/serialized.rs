//! Serial delivery of concurrently produced signals.

use std::sync::{
  atomic::{AtomicBool, AtomicUsize, Ordering},
  Arc,
};

use crossbeam_queue::SegQueue;

use crate::{
  error::SignalError,
  hooks,
  subscriber::Subscriber,
  subscription::{Subscription, Upstream},
};

enum Signal<T> {
  Next(T),
  Error(SignalError),
  Complete,
}

/// Wraps a subscriber so that its signals are delivered in strict serial
/// order even when multiple threads call in concurrently.
///
/// Incoming signals are queued; the caller that takes the work-in-progress
/// counter from 0 to 1 becomes the drain owner and forwards queued signals
/// until the counter returns to 0. Other callers enqueue and leave.
/// Terminal signals latch a sticky flag: anything arriving afterwards is
/// routed to the [`hooks`] instead of the wrapped subscriber.
pub struct SerializedSubscriber<T: Send + 'static> {
  actual: Arc<dyn Subscriber<Item = T>>,
  queue: SegQueue<Signal<T>>,
  wip: AtomicUsize,
  done: AtomicBool,
  subscribed: AtomicBool,
}

impl<T: Send + 'static> SerializedSubscriber<T> {
  pub fn new(actual: Arc<dyn Subscriber<Item = T>>) -> Self {
    SerializedSubscriber {
      actual,
      queue: SegQueue::new(),
      wip: AtomicUsize::new(0),
      done: AtomicBool::new(false),
      subscribed: AtomicBool::new(false),
    }
  }

  fn enqueue(&self, signal: Signal<T>) {
    self.queue.push(signal);
    if self.wip.fetch_add(1, Ordering::SeqCst) != 0 {
      return;
    }
    // Drain owner: one queued signal per counted increment.
    loop {
      if let Some(signal) = self.queue.pop() {
        match signal {
          Signal::Next(value) => self.actual.on_next(value),
          Signal::Error(error) => self.actual.on_error(error),
          Signal::Complete => self.actual.on_complete(),
        }
      }
      if self.wip.fetch_sub(1, Ordering::SeqCst) == 1 {
        return;
      }
    }
  }
}

impl<T: Send + 'static> Subscriber for SerializedSubscriber<T> {
  type Item = T;

  fn on_subscribe(&self, upstream: Upstream<T>) {
    if self.subscribed.swap(true, Ordering::SeqCst) {
      hooks::violation("on_subscribe called on a serialized subscriber that already has a subscription");
      upstream.cancel();
      return;
    }
    self.actual.on_subscribe(upstream);
  }

  fn on_next(&self, value: T) {
    if self.done.load(Ordering::SeqCst) {
      hooks::value_dropped();
      return;
    }
    self.enqueue(Signal::Next(value));
  }

  fn on_error(&self, error: SignalError) {
    if self.done.swap(true, Ordering::SeqCst) {
      hooks::error_dropped(&error);
      return;
    }
    self.enqueue(Signal::Error(error));
  }

  fn on_complete(&self) {
    if self.done.swap(true, Ordering::SeqCst) {
      return;
    }
    self.enqueue(Signal::Complete);
  }
}
