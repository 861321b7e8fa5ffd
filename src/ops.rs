//! Operators decorating a [`Publisher`].

use crate::{
  error::SignalError,
  processor::direct::DirectProcessor,
  publisher::Publisher,
};

pub mod accumulate;
pub mod retry_when;

use self::accumulate::Accumulate;
use self::retry_when::RetryWhen;

/// Fluent constructors for the operators in this module, blanket
/// implemented for every publisher.
pub trait PublisherExt: Publisher + Sized {
  /// Re-subscribe to this publisher whenever `handler`'s companion
  /// publisher signals a value in response to an error; see
  /// [`RetryWhen`].
  fn retry_when<F, C>(self, handler: F) -> RetryWhen<Self, F>
  where
    Self: Clone + Send + Sync + 'static,
    F: Fn(DirectProcessor<SignalError>) -> C,
    C: Publisher,
  {
    RetryWhen::new(self, handler)
  }

  /// Fold each value into a running accumulation, emitting the
  /// intermediate results; see [`Accumulate`].
  fn accumulate<F>(self, accumulator: F) -> Accumulate<Self, F>
  where
    Self::Item: Clone,
    F: FnMut(Self::Item, Self::Item) -> Result<Self::Item, SignalError> + Clone + Send + 'static,
  {
    Accumulate::new(self, accumulator)
  }
}

impl<P: Publisher + Sized> PublisherExt for P {}
