//! A minimal hot publisher for signalling.

use std::sync::{
  atomic::{AtomicBool, AtomicU64, Ordering},
  Arc, Mutex, Weak,
};

use smallvec::SmallVec;

use crate::{
  demand::{self, UNBOUNDED},
  error::SignalError,
  hooks,
  publisher::Publisher,
  subscriber::Subscriber,
  subscription::{Subscription, Upstream},
};

/// Forwards each signal to all current subscribers, with no buffering
/// and no replay.
///
/// Used to carry control signals between the halves of re-subscribing
/// operators. A subscriber without outstanding demand when a value
/// arrives is terminated with [`SignalError::Overflow`]; subscribers
/// arriving after termination receive the terminal signal immediately.
/// The handle is cheaply cloneable and usable as both a [`Publisher`]
/// and a [`Subscriber`].
pub struct DirectProcessor<T: Send + 'static> {
  inner: Arc<DirectInner<T>>,
}

impl<T: Send + 'static> Clone for DirectProcessor<T> {
  fn clone(&self) -> Self { DirectProcessor { inner: self.inner.clone() } }
}

struct DirectInner<T: Send + 'static> {
  state: Mutex<DirectState<T>>,
}

struct DirectState<T: Send + 'static> {
  subscribers: SmallVec<[Arc<DirectSubscription<T>>; 2]>,
  terminal: Option<Terminal>,
}

#[derive(Clone)]
enum Terminal {
  Complete,
  Error(SignalError),
}

struct DirectSubscription<T: Send + 'static> {
  parent: Weak<DirectInner<T>>,
  actual: Arc<dyn Subscriber<Item = T>>,
  requested: AtomicU64,
  cancelled: AtomicBool,
}

impl<T: Send + 'static> DirectSubscription<T> {
  fn remove(&self) {
    if let Some(parent) = self.parent.upgrade() {
      let mut state = parent.state.lock().unwrap();
      state.subscribers.retain(|s| !s.cancelled.load(Ordering::SeqCst));
    }
  }
}

impl<T: Send + 'static> Subscription for DirectSubscription<T> {
  fn request(&self, n: u64) {
    if !demand::validate(n) {
      if !self.cancelled.swap(true, Ordering::SeqCst) {
        self.remove();
        self.actual.on_error(SignalError::BadRequest);
      }
      return;
    }
    demand::add_cap(&self.requested, n);
  }

  fn cancel(&self) {
    if !self.cancelled.swap(true, Ordering::SeqCst) {
      self.remove();
    }
  }
}

impl<T: Send + 'static> DirectProcessor<T> {
  pub fn new() -> Self {
    DirectProcessor {
      inner: Arc::new(DirectInner {
        state: Mutex::new(DirectState { subscribers: SmallVec::new(), terminal: None }),
      }),
    }
  }

  /// True while at least one subscriber is connected.
  pub fn has_subscribers(&self) -> bool {
    !self.inner.state.lock().unwrap().subscribers.is_empty()
  }

  fn terminate(&self, terminal: Terminal) -> bool {
    let subscribers = {
      let mut state = self.inner.state.lock().unwrap();
      if state.terminal.is_some() {
        return false;
      }
      state.terminal = Some(terminal.clone());
      std::mem::take(&mut state.subscribers)
    };
    for sub in subscribers {
      if sub.cancelled.load(Ordering::SeqCst) {
        continue;
      }
      match &terminal {
        Terminal::Complete => sub.actual.on_complete(),
        Terminal::Error(error) => sub.actual.on_error(error.clone()),
      }
    }
    true
  }
}

impl<T: Send + 'static> Default for DirectProcessor<T> {
  fn default() -> Self { Self::new() }
}

impl<T: Send + 'static> Publisher for DirectProcessor<T> {
  type Item = T;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = T>>) {
    let subscription = Arc::new(DirectSubscription {
      parent: Arc::downgrade(&self.inner),
      actual: subscriber.clone(),
      requested: AtomicU64::new(0),
      cancelled: AtomicBool::new(false),
    });
    subscriber.on_subscribe(Upstream::Push(subscription.clone()));

    let terminal = {
      let mut state = self.inner.state.lock().unwrap();
      match &state.terminal {
        Some(terminal) => Some(terminal.clone()),
        None => {
          if !subscription.cancelled.load(Ordering::SeqCst) {
            state.subscribers.push(subscription);
          }
          None
        }
      }
    };
    match terminal {
      Some(Terminal::Complete) => subscriber.on_complete(),
      Some(Terminal::Error(error)) => subscriber.on_error(error),
      None => {}
    }
  }
}

impl<T: Clone + Send + 'static> Subscriber for DirectProcessor<T> {
  type Item = T;

  fn on_subscribe(&self, upstream: Upstream<T>) { upstream.request(UNBOUNDED); }

  fn on_next(&self, value: T) {
    let subscribers = {
      let state = self.inner.state.lock().unwrap();
      state.subscribers.clone()
    };
    for sub in subscribers {
      if sub.cancelled.load(Ordering::SeqCst) {
        continue;
      }
      if sub.requested.load(Ordering::SeqCst) != 0 {
        demand::produced(&sub.requested, 1);
        sub.actual.on_next(value.clone());
      } else {
        // No demand to cover the value: terminate this subscriber, the
        // others keep receiving.
        sub.cancel();
        sub.actual.on_error(SignalError::Overflow);
      }
    }
  }

  fn on_error(&self, error: SignalError) {
    if !self.terminate(Terminal::Error(error.clone())) {
      hooks::error_dropped(&error);
    }
  }

  fn on_complete(&self) { self.terminate(Terminal::Complete); }
}
