//! The cancelled-sentinel subscription and the immediate-termination
//! helpers built on it.
//!
//! A publisher that knows at subscribe time that it has nothing to emit
//! still owes the subscriber exactly one `on_subscribe` before the
//! terminal signal; these helpers keep that ordering in one place.

use std::sync::Arc;

use crate::{
  error::SignalError,
  subscriber::Subscriber,
  subscription::{Subscription, Upstream},
};

/// A subscription that ignores demand and cancellation. Handed to
/// subscribers of streams that terminate immediately.
pub struct EmptySubscription;

impl Subscription for EmptySubscription {
  #[inline]
  fn request(&self, _n: u64) {}

  #[inline]
  fn cancel(&self) {}
}

/// Deliver `on_subscribe` followed by `on_complete`.
pub fn complete<T: Send + 'static>(subscriber: &Arc<dyn Subscriber<Item = T>>) {
  subscriber.on_subscribe(Upstream::Push(Arc::new(EmptySubscription)));
  subscriber.on_complete();
}

/// Deliver `on_subscribe` followed by `on_error(error)`.
pub fn error<T: Send + 'static>(subscriber: &Arc<dyn Subscriber<Item = T>>, error: SignalError) {
  subscriber.on_subscribe(Upstream::Push(Arc::new(EmptySubscription)));
  subscriber.on_error(error);
}
