//! Running accumulation over a stream's values.

use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc, Mutex, Weak,
};

use crate::{
  error::SignalError,
  hooks,
  publisher::Publisher,
  subscriber::Subscriber,
  subscription::{self, Subscription, Upstream},
};

/// Folds the source's values with an accumulator and emits the
/// intermediate results.
///
/// The first value is forwarded as-is and becomes the initial
/// accumulation:
///
/// ```text
/// result[0] = source[0]
/// result[1] = accumulator(result[0], source[1])
/// result[2] = accumulator(result[1], source[2])
/// ```
///
/// An `Err` from the accumulator cancels the upstream and terminates
/// the downstream with that error.
#[derive(Clone)]
pub struct Accumulate<P, F> {
  source: P,
  accumulator: F,
}

impl<P, F> Accumulate<P, F> {
  pub fn new(source: P, accumulator: F) -> Self { Accumulate { source, accumulator } }
}

impl<P, F> Publisher for Accumulate<P, F>
where
  P: Publisher,
  P::Item: Clone,
  F: FnMut(P::Item, P::Item) -> Result<P::Item, SignalError> + Clone + Send + 'static,
{
  type Item = P::Item;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = P::Item>>) {
    let sub = Arc::new_cyclic(|weak: &Weak<AccumulateSubscriber<P::Item, F>>| {
      AccumulateSubscriber {
        this: weak.clone(),
        actual: subscriber,
        state: Mutex::new(AccState { accumulator: self.accumulator.clone(), value: None }),
        upstream: Mutex::new(None),
        done: AtomicBool::new(false),
      }
    });
    self.source.subscribe(sub);
  }
}

struct AccState<T, F> {
  accumulator: F,
  value: Option<T>,
}

struct AccumulateSubscriber<T: Send + 'static, F> {
  this: Weak<Self>,
  actual: Arc<dyn Subscriber<Item = T>>,
  state: Mutex<AccState<T, F>>,
  upstream: Mutex<Option<Upstream<T>>>,
  done: AtomicBool,
}

impl<T, F> AccumulateSubscriber<T, F>
where
  T: Clone + Send + 'static,
  F: FnMut(T, T) -> Result<T, SignalError> + Send + 'static,
{
  fn upstream(&self) -> Option<Upstream<T>> { self.upstream.lock().unwrap().clone() }

  fn cancel_upstream(&self) {
    if let Some(upstream) = self.upstream() {
      upstream.cancel();
    }
  }
}

impl<T, F> Subscriber for AccumulateSubscriber<T, F>
where
  T: Clone + Send + 'static,
  F: FnMut(T, T) -> Result<T, SignalError> + Send + 'static,
{
  type Item = T;

  fn on_subscribe(&self, upstream: Upstream<T>) {
    if subscription::set_once(&self.upstream, upstream) {
      if let Some(this) = self.this.upgrade() {
        self.actual.on_subscribe(Upstream::Push(this));
      }
    }
  }

  fn on_next(&self, value: T) {
    if self.done.load(Ordering::SeqCst) {
      hooks::value_dropped();
      return;
    }
    // Fold under the lock, signal outside it.
    let folded = {
      let mut state = self.state.lock().unwrap();
      match state.value.take() {
        None => {
          state.value = Some(value.clone());
          Ok(value)
        }
        Some(previous) => match (state.accumulator)(previous, value) {
          Ok(next) => {
            state.value = Some(next.clone());
            Ok(next)
          }
          Err(error) => Err(error),
        },
      }
    };
    match folded {
      Ok(value) => self.actual.on_next(value),
      Err(error) => {
        self.cancel_upstream();
        self.on_error(error);
      }
    }
  }

  fn on_error(&self, error: SignalError) {
    if self.done.swap(true, Ordering::SeqCst) {
      hooks::error_dropped(&error);
      return;
    }
    self.actual.on_error(error);
  }

  fn on_complete(&self) {
    if self.done.swap(true, Ordering::SeqCst) {
      return;
    }
    self.actual.on_complete();
  }
}

impl<T, F> Subscription for AccumulateSubscriber<T, F>
where
  T: Clone + Send + 'static,
  F: FnMut(T, T) -> Result<T, SignalError> + Send + 'static,
{
  fn request(&self, n: u64) {
    if let Some(upstream) = self.upstream() {
      upstream.request(n);
    }
  }

  fn cancel(&self) { self.cancel_upstream(); }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::AtomicUsize;

  use super::*;
  use crate::{
    demand::UNBOUNDED,
    ops::PublisherExt,
    publisher::from_iterable::from_iter,
    test_subscriber::TestSubscriber,
  };

  #[test]
  fn emits_running_accumulation() {
    let ts = TestSubscriber::with_request(UNBOUNDED);
    from_iter([1, 2, 3]).accumulate(|a, b| Ok(a + b)).subscribe(ts.clone());
    ts.assert_values(&[1, 3, 6]);
    ts.assert_complete();
    ts.assert_no_error();
  }

  #[test]
  fn single_value_passes_through() {
    let ts = TestSubscriber::with_request(UNBOUNDED);
    from_iter([5]).accumulate(|a, b| Ok(a + b)).subscribe(ts.clone());
    ts.assert_values(&[5]);
    ts.assert_complete();
  }

  #[test]
  fn accumulator_error_cancels_upstream() {
    // Failing on the second item must deliver the first result, then
    // the error, and stop pulling from the source.
    let ts = TestSubscriber::with_request(UNBOUNDED);
    from_iter([1, 2, 3])
      .accumulate(|_a, _b| Err(SignalError::MissingElement("accumulator")))
      .subscribe(ts.clone());

    ts.assert_values(&[1]);
    ts.assert_error_matches(|e| e.is_missing_element());
    ts.assert_not_complete();
  }

  #[test]
  fn signals_after_done_are_routed_to_hooks() {
    let dropped = Arc::new(AtomicUsize::new(0));
    let counter = dropped.clone();
    hooks::with_error_capture(
      Arc::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
      }),
      || {
        let ts = TestSubscriber::with_request(UNBOUNDED);
        let acc = Arc::new_cyclic(|weak: &Weak<AccumulateSubscriber<i32, _>>| {
          AccumulateSubscriber {
            this: weak.clone(),
            actual: ts.clone() as Arc<dyn Subscriber<Item = i32>>,
            state: Mutex::new(AccState {
              accumulator: |a: i32, b: i32| Ok(a + b),
              value: None,
            }),
            upstream: Mutex::new(None),
            done: AtomicBool::new(false),
          }
        });

        acc.on_error(SignalError::failure("first"));
        acc.on_error(SignalError::failure("second"));
        acc.on_next(7);

        ts.assert_no_values();
        ts.assert_error_message("first");
      },
    );
    assert_eq!(dropped.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn demand_flows_through_to_the_source() {
    let ts = TestSubscriber::new();
    from_iter(1..=10).accumulate(|a, b| Ok(a + b)).subscribe(ts.clone());

    ts.request(3);
    ts.assert_values(&[1, 3, 6]);
    ts.assert_not_complete();
  }
}
