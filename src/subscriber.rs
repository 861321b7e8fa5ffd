//! The producer-to-consumer half of the signal protocol.

use crate::{error::SignalError, subscription::Upstream};

pub mod multi;
pub mod serialized;

/// A consumer of a signal stream.
///
/// A publisher delivers exactly one `on_subscribe`, then zero or more
/// `on_next` within outstanding demand, then at most one of `on_error`
/// or `on_complete`. Signals on a single subscription are serialized by
/// the producer, but the subscriber object itself is shared, so all
/// methods take `&self` and implementations use interior mutability.
pub trait Subscriber: Send + Sync {
  type Item: Send + 'static;

  /// Receive the upstream handle. Called exactly once per subscription;
  /// a second call must cancel the incoming upstream
  /// (see [`set_once`](crate::subscription::set_once)).
  fn on_subscribe(&self, upstream: Upstream<Self::Item>);

  fn on_next(&self, value: Self::Item);

  fn on_error(&self, error: SignalError);

  fn on_complete(&self);

  /// Conditional delivery: returns false if the value was rejected
  /// without consuming demand, letting fused filter-like consumers keep
  /// their bounded budget. The default accepts every value by
  /// forwarding to [`on_next`](Subscriber::on_next).
  fn try_on_next(&self, value: Self::Item) -> bool {
    self.on_next(value);
    true
  }
}
