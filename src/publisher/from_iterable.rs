//! Synchronous emission of an iterable's contents.
//!
//! The subscription drives the iterator on the caller's thread: the
//! thread that takes the demand counter from 0 to positive owns the
//! emission loop, and later `request` calls only top the counter up.
//! The subscription also implements the fusion extension, so a
//! fusion-aware downstream can poll values instead of being pushed.

use std::{
  iter, mem,
  sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
  },
};

use crossbeam_utils::CachePadded;

use crate::{
  demand::{self, UNBOUNDED},
  error::SignalError,
  publisher::Publisher,
  subscriber::Subscriber,
  subscription::{empty, Subscription, SyncSubscription, Upstream},
};

/// Item adapter used by [`from_iter`].
pub type InfallibleItem<T> = fn(T) -> Result<T, SignalError>;

/// Item adapter used by [`from_option_iter`].
pub type OptionItem<T> = fn(Option<T>) -> Result<T, SignalError>;

/// A publisher emitting the contents of an iterable.
///
/// The iterable's items are `Result`s so that per-element source
/// failures flow through the same engine; [`from_iter`] adapts plain
/// iterables. Each `subscribe` clones the iterable, so the publisher
/// can be subscribed repeatedly.
#[derive(Clone)]
pub struct FromIterable<I> {
  iterable: I,
}

impl<I> FromIterable<I> {
  pub fn new(iterable: I) -> Self { FromIterable { iterable } }
}

/// Emit the elements of `iterable` in order, then complete.
pub fn from_iter<I>(
  iterable: I,
) -> FromIterable<iter::Map<I::IntoIter, InfallibleItem<I::Item>>>
where
  I: IntoIterator,
  I::IntoIter: Clone,
  I::Item: Send + 'static,
{
  FromIterable::new(iterable.into_iter().map(Ok as InfallibleItem<I::Item>))
}

/// Emit the `Ok` elements of `iterable`; an `Err` element terminates
/// the stream with that error.
pub fn from_try_iter<I, T>(iterable: I) -> FromIterable<I>
where
  I: IntoIterator<Item = Result<T, SignalError>> + Clone,
  T: Send + 'static,
{
  FromIterable::new(iterable)
}

fn require_element<T>(item: Option<T>) -> Result<T, SignalError> {
  item.ok_or(SignalError::MissingElement("iterator"))
}

/// Emit the `Some` elements of `iterable`; a `None` element is a
/// protocol violation terminating the stream with
/// [`SignalError::MissingElement`].
pub fn from_option_iter<I, T>(
  iterable: I,
) -> FromIterable<iter::Map<I::IntoIter, OptionItem<T>>>
where
  I: IntoIterator<Item = Option<T>>,
  I::IntoIter: Clone,
  T: Send + 'static,
{
  FromIterable::new(iterable.into_iter().map(require_element as OptionItem<T>))
}

impl<I, T> Publisher for FromIterable<I>
where
  I: IntoIterator<Item = Result<T, SignalError>> + Clone,
  I::IntoIter: Send + 'static,
  T: Send + 'static,
{
  type Item = T;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = T>>) {
    // Probe the first element up front: an empty or immediately failing
    // source terminates without a live subscription.
    let mut iter = self.iterable.clone().into_iter();
    match iter.next() {
      None => empty::complete(&subscriber),
      Some(Err(error)) => empty::error(&subscriber, error),
      Some(Ok(first)) => {
        let subscription = Arc::new(IterableSubscription {
          actual: subscriber.clone(),
          requested: CachePadded::new(AtomicU64::new(0)),
          cancelled: AtomicBool::new(false),
          inner: Mutex::new(Inner { iter, probe: Probe::Ready(first) }),
        });
        subscriber.on_subscribe(Upstream::Sync(subscription));
      }
    }
  }
}

/// One-slot element buffer between the iterator and the consumer.
///
/// Probing a Rust iterator materializes the element, so the probe
/// always lands in `Ready` (or a terminal state); on the push path the
/// slot is re-filled eagerly after every emission so that exhaustion
/// completes the stream without waiting for further demand.
enum Probe<T> {
  /// Consumed; the iterator must be advanced to learn more.
  Pending,
  /// An element is buffered.
  Ready(T),
  /// The source failed; the error is delivered on the next take.
  Failed(SignalError),
  /// Drained. Terminal.
  Exhausted,
}

struct Inner<I, T> {
  iter: I,
  probe: Probe<T>,
}

impl<I, T> Inner<I, T>
where
  I: Iterator<Item = Result<T, SignalError>>,
{
  fn advance(&mut self) {
    self.probe = match self.iter.next() {
      Some(Ok(value)) => Probe::Ready(value),
      Some(Err(error)) => Probe::Failed(error),
      None => Probe::Exhausted,
    };
  }
}

struct IterableSubscription<I, T: Send + 'static> {
  actual: Arc<dyn Subscriber<Item = T>>,
  requested: CachePadded<AtomicU64>,
  cancelled: AtomicBool,
  inner: Mutex<Inner<I, T>>,
}

impl<I, T> IterableSubscription<I, T>
where
  I: Iterator<Item = Result<T, SignalError>> + Send + 'static,
  T: Send + 'static,
{
  /// Unbounded emission: loop to exhaustion, checking cancellation at
  /// every loop edge.
  fn fast_path(&self) {
    let mut inner = self.inner.lock().unwrap();
    loop {
      if self.cancelled.load(Ordering::SeqCst) {
        return;
      }
      match mem::replace(&mut inner.probe, Probe::Pending) {
        Probe::Ready(value) => {
          self.actual.try_on_next(value);
        }
        Probe::Failed(error) => {
          inner.probe = Probe::Exhausted;
          self.actual.on_error(error);
          return;
        }
        Probe::Exhausted => {
          inner.probe = Probe::Exhausted;
          self.actual.on_complete();
          return;
        }
        Probe::Pending => {}
      }
      if self.cancelled.load(Ordering::SeqCst) {
        return;
      }
      inner.advance();
    }
  }

  /// Bounded emission: emit up to the outstanding demand, retiring the
  /// emitted count against the counter. Whichever thread owns emission
  /// also drains demand added concurrently by other `request` callers.
  fn slow_path(&self, n: u64) {
    let mut inner = self.inner.lock().unwrap();
    let mut n = n;
    let mut e = 0u64;
    loop {
      while e != n {
        if self.cancelled.load(Ordering::SeqCst) {
          return;
        }
        let value = match mem::replace(&mut inner.probe, Probe::Pending) {
          Probe::Ready(value) => value,
          Probe::Failed(error) => {
            inner.probe = Probe::Exhausted;
            self.actual.on_error(error);
            return;
          }
          Probe::Exhausted => {
            inner.probe = Probe::Exhausted;
            self.actual.on_complete();
            return;
          }
          Probe::Pending => {
            inner.advance();
            continue;
          }
        };

        // Rejected values do not consume the bounded budget.
        let consumed = self.actual.try_on_next(value);

        if self.cancelled.load(Ordering::SeqCst) {
          return;
        }
        inner.advance();
        match mem::replace(&mut inner.probe, Probe::Pending) {
          Probe::Exhausted => {
            inner.probe = Probe::Exhausted;
            self.actual.on_complete();
            return;
          }
          Probe::Failed(error) => {
            inner.probe = Probe::Exhausted;
            self.actual.on_error(error);
            return;
          }
          probe => inner.probe = probe,
        }
        if self.cancelled.load(Ordering::SeqCst) {
          return;
        }

        if consumed {
          e += 1;
        }
      }

      n = self.requested.load(Ordering::SeqCst);
      if n == e {
        n = demand::produced(&self.requested, e);
        if n == 0 {
          return;
        }
        e = 0;
      }
    }
  }
}

impl<I, T> Subscription for IterableSubscription<I, T>
where
  I: Iterator<Item = Result<T, SignalError>> + Send + 'static,
  T: Send + 'static,
{
  fn request(&self, n: u64) {
    if !demand::validate(n) {
      if !self.cancelled.swap(true, Ordering::SeqCst) {
        self.actual.on_error(SignalError::BadRequest);
      }
      return;
    }
    if demand::add_cap(&self.requested, n) == 0 {
      if n == UNBOUNDED {
        self.fast_path();
      } else {
        self.slow_path(n);
      }
    }
  }

  fn cancel(&self) { self.cancelled.store(true, Ordering::SeqCst); }
}

impl<I, T> SyncSubscription for IterableSubscription<I, T>
where
  I: Iterator<Item = Result<T, SignalError>> + Send + 'static,
  T: Send + 'static,
{
  type Item = T;

  fn poll(&self) -> Result<Option<T>, SignalError> {
    let mut inner = self.inner.lock().unwrap();
    let next = match mem::replace(&mut inner.probe, Probe::Pending) {
      Probe::Pending => inner.iter.next(),
      Probe::Ready(value) => Some(Ok(value)),
      Probe::Failed(error) => Some(Err(error)),
      Probe::Exhausted => None,
    };
    match next {
      Some(Ok(value)) => Ok(Some(value)),
      Some(Err(error)) => {
        inner.probe = Probe::Exhausted;
        Err(error)
      }
      None => {
        inner.probe = Probe::Exhausted;
        Ok(None)
      }
    }
  }

  fn is_empty(&self) -> bool {
    let mut inner = self.inner.lock().unwrap();
    match inner.probe {
      Probe::Exhausted => true,
      Probe::Ready(_) | Probe::Failed(_) => false,
      Probe::Pending => {
        inner.advance();
        matches!(inner.probe, Probe::Exhausted)
      }
    }
  }

  fn len(&self) -> usize {
    match self.inner.lock().unwrap().probe {
      Probe::Exhausted => 0,
      _ => 1,
    }
  }

  fn clear(&self) { self.inner.lock().unwrap().probe = Probe::Exhausted; }
}
