//! A scriptable subscriber that records every signal it observes.
//!
//! The equivalent of the operator tests' standard probe: demand can be
//! fixed up front or issued step by step, an accept predicate turns it
//! into a conditional subscriber, and the recorded signals are checked
//! with panicking assertions.

use std::{
  fmt::Debug,
  sync::{Arc, Mutex},
};

use crate::{
  demand::UNBOUNDED,
  error::SignalError,
  subscriber::Subscriber,
  subscription::{self, Subscription, Upstream},
};

type Accept<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

pub struct TestSubscriber<T: Send + 'static> {
  initial_request: u64,
  accept: Option<Accept<T>>,
  cancel_after: Option<usize>,
  upstream: Mutex<Option<Upstream<T>>>,
  state: Mutex<TestState<T>>,
}

struct TestState<T> {
  values: Vec<T>,
  errors: Vec<SignalError>,
  completions: usize,
  rejected: usize,
}

impl<T> Default for TestState<T> {
  fn default() -> Self {
    TestState { values: Vec::new(), errors: Vec::new(), completions: 0, rejected: 0 }
  }
}

impl<T: Send + 'static> TestSubscriber<T> {
  fn build(initial_request: u64, accept: Option<Accept<T>>, cancel_after: Option<usize>) -> Arc<Self> {
    Arc::new(TestSubscriber {
      initial_request,
      accept,
      cancel_after,
      upstream: Mutex::new(None),
      state: Mutex::new(TestState::default()),
    })
  }

  /// A subscriber that issues no demand until told to.
  pub fn new() -> Arc<Self> { Self::build(0, None, None) }

  /// A subscriber requesting `n` on subscription.
  pub fn with_request(n: u64) -> Arc<Self> { Self::build(n, None, None) }

  /// A subscriber requesting unbounded demand on subscription.
  pub fn unbounded() -> Arc<Self> { Self::build(UNBOUNDED, None, None) }

  /// A conditional subscriber requesting `n` and accepting only values
  /// matching `accept`; rejected values are counted, not recorded.
  pub fn filtering(n: u64, accept: impl Fn(&T) -> bool + Send + Sync + 'static) -> Arc<Self> {
    Self::build(n, Some(Box::new(accept)), None)
  }

  /// A subscriber that cancels its upstream after recording `n` values.
  pub fn cancelling_after(n: usize) -> Arc<Self> { Self::build(UNBOUNDED, None, Some(n)) }

  pub fn upstream(&self) -> Option<Upstream<T>> { self.upstream.lock().unwrap().clone() }

  pub fn request(&self, n: u64) {
    if let Some(upstream) = self.upstream() {
      upstream.request(n);
    }
  }

  pub fn cancel(&self) {
    if let Some(upstream) = self.upstream() {
      upstream.cancel();
    }
  }

  pub fn rejected(&self) -> usize { self.state.lock().unwrap().rejected }

  pub fn completions(&self) -> usize { self.state.lock().unwrap().completions }

  pub fn error_count(&self) -> usize { self.state.lock().unwrap().errors.len() }

  fn record(&self, value: T) {
    let recorded = {
      let mut state = self.state.lock().unwrap();
      state.values.push(value);
      state.values.len()
    };
    if self.cancel_after.is_some_and(|limit| recorded >= limit) {
      self.cancel();
    }
  }

  pub fn assert_no_values(&self) {
    let count = self.state.lock().unwrap().values.len();
    assert_eq!(count, 0, "expected no values, got {count}");
  }

  pub fn assert_value_count(&self, expected: usize) {
    let count = self.state.lock().unwrap().values.len();
    assert_eq!(count, expected, "expected {expected} values, got {count}");
  }

  pub fn assert_complete(&self) {
    let completions = self.completions();
    assert_eq!(completions, 1, "expected exactly one completion, got {completions}");
  }

  pub fn assert_not_complete(&self) {
    let completions = self.completions();
    assert_eq!(completions, 0, "expected no completion, got {completions}");
  }

  pub fn assert_no_error(&self) {
    let state = self.state.lock().unwrap();
    assert!(state.errors.is_empty(), "expected no error, got {:?}", state.errors);
  }

  pub fn assert_error_message(&self, expected: &str) {
    let state = self.state.lock().unwrap();
    assert_eq!(state.errors.len(), 1, "expected exactly one error, got {:?}", state.errors);
    let message = state.errors[0].to_string();
    assert_eq!(message, expected, "expected error message {expected:?}, got {message:?}");
  }

  pub fn assert_error_matches(&self, predicate: impl Fn(&SignalError) -> bool) {
    let state = self.state.lock().unwrap();
    assert_eq!(state.errors.len(), 1, "expected exactly one error, got {:?}", state.errors);
    assert!(predicate(&state.errors[0]), "error did not match: {:?}", state.errors[0]);
  }
}

impl<T: Clone + Send + 'static> TestSubscriber<T> {
  pub fn values(&self) -> Vec<T> { self.state.lock().unwrap().values.clone() }
}

impl<T: Debug + PartialEq + Send + 'static> TestSubscriber<T> {
  pub fn assert_values(&self, expected: &[T]) {
    let state = self.state.lock().unwrap();
    assert_eq!(
      state.values.as_slice(),
      expected,
      "recorded values did not match the expected sequence"
    );
  }
}

impl<T: Send + 'static> Subscriber for TestSubscriber<T> {
  type Item = T;

  fn on_subscribe(&self, upstream: Upstream<T>) {
    if subscription::set_once(&self.upstream, upstream) && self.initial_request != 0 {
      self.request(self.initial_request);
    }
  }

  fn on_next(&self, value: T) { self.record(value); }

  fn try_on_next(&self, value: T) -> bool {
    match &self.accept {
      None => {
        self.record(value);
        true
      }
      Some(accept) => {
        if accept(&value) {
          self.record(value);
          true
        } else {
          self.state.lock().unwrap().rejected += 1;
          false
        }
      }
    }
  }

  fn on_error(&self, error: SignalError) { self.state.lock().unwrap().errors.push(error); }

  fn on_complete(&self) { self.state.lock().unwrap().completions += 1; }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::subscription::empty::EmptySubscription;

  #[test]
  fn records_signals_in_order() {
    let ts = TestSubscriber::new();
    ts.on_subscribe(Upstream::Push(Arc::new(EmptySubscription)));
    ts.on_next(1);
    ts.on_next(2);
    ts.on_complete();

    ts.assert_values(&[1, 2]);
    ts.assert_complete();
    ts.assert_no_error();
  }

  #[test]
  fn filtering_counts_rejections() {
    let ts = TestSubscriber::filtering(10, |v: &i32| *v > 0);
    assert!(ts.try_on_next(1));
    assert!(!ts.try_on_next(-1));
    ts.assert_values(&[1]);
    assert_eq!(ts.rejected(), 1);
  }
}
