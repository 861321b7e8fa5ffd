//! The producer side of the signal protocol, and the built-in sources.

use std::{iter, sync::Arc};

use crate::{error::SignalError, subscriber::Subscriber};

pub mod fail;
pub mod from_iterable;

use self::from_iterable::{from_iter, FromIterable, InfallibleItem};

/// A source of a signal stream.
///
/// `subscribe` must deliver exactly one `on_subscribe` to the
/// subscriber, synchronously or asynchronously, before any other
/// signal. Publishers are reusable: each `subscribe` opens an
/// independent stream.
pub trait Publisher {
  type Item: Send + 'static;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = Self::Item>>);
}

/// A source emitting a single value, then completing.
pub fn of<T>(value: T) -> FromIterable<iter::Map<iter::Once<T>, InfallibleItem<T>>>
where
  T: Clone + Send + 'static,
{
  from_iter(iter::once(value))
}

/// A source completing immediately without values.
pub fn empty<T>() -> FromIterable<iter::Map<iter::Empty<T>, InfallibleItem<T>>>
where
  T: Send + 'static,
{
  from_iter(iter::empty())
}

/// A source failing immediately with `error`.
pub fn fail_with<T>(error: SignalError) -> fail::Fail<T>
where
  T: Send + 'static,
{
  fail::Fail::new(error)
}
