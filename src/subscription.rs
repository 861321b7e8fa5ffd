//! The consumer-to-producer half of the signal protocol.
//!
//! A [`Subscription`] is the handle a subscriber uses to pull demand
//! through a publisher: `request(n)` adds to outstanding demand and
//! `cancel` tears the link down. Sources that can be polled
//! synchronously additionally implement [`SyncSubscription`], and
//! advertise that capability through the [`Upstream`] tag handed to
//! `on_subscribe`.

use std::sync::{Arc, Mutex};

use crate::{error::SignalError, hooks};

pub mod deferred;
pub mod empty;

/// Demand and lifecycle control for one subscriber on one publisher.
///
/// Both methods may be called from any thread. `cancel` is idempotent
/// and may race with in-flight signals; producers stop emitting at the
/// next cancellation check.
pub trait Subscription: Send + Sync {
  /// Add `n` to outstanding demand. `n == 0` is a protocol violation
  /// reported through the subscriber's error channel.
  fn request(&self, n: u64);

  /// Stop delivery. Signals already in flight may still arrive.
  fn cancel(&self);
}

/// Fusion extension: a subscription whose values can be polled
/// synchronously instead of pushed.
///
/// After the first `poll` or `is_empty` call the downstream owns the
/// pace and must not call `request`; the push and poll protocols do not
/// mix on one subscription.
pub trait SyncSubscription: Subscription {
  type Item: Send + 'static;

  /// Take the next value. `Ok(None)` means the source is drained;
  /// `Err` carries a source failure and exhausts the subscription.
  fn poll(&self) -> Result<Option<Self::Item>, SignalError>;

  /// Probe for a next value without consuming it.
  fn is_empty(&self) -> bool;

  /// Number of immediately known values: 1 until drained, then 0.
  fn len(&self) -> usize;

  /// Discard any remaining values and exhaust the subscription.
  fn clear(&self);
}

/// Capability tag handed to `Subscriber::on_subscribe`.
///
/// Every upstream supports the push protocol through the
/// [`Subscription`] impl on this enum; a fusion-aware downstream can
/// match on [`Upstream::Sync`] to switch to synchronous polling.
pub enum Upstream<T: Send + 'static> {
  /// Push-only upstream.
  Push(Arc<dyn Subscription>),
  /// Upstream supporting synchronous polling.
  Sync(Arc<dyn SyncSubscription<Item = T>>),
}

impl<T: Send + 'static> Clone for Upstream<T> {
  fn clone(&self) -> Self {
    match self {
      Upstream::Push(s) => Upstream::Push(s.clone()),
      Upstream::Sync(s) => Upstream::Sync(s.clone()),
    }
  }
}

impl<T: Send + 'static> Upstream<T> {
  /// The fused view of this upstream, if it supports polling.
  pub fn fused(&self) -> Option<&Arc<dyn SyncSubscription<Item = T>>> {
    match self {
      Upstream::Push(_) => None,
      Upstream::Sync(s) => Some(s),
    }
  }
}

impl<T: Send + 'static> Subscription for Upstream<T> {
  #[inline]
  fn request(&self, n: u64) {
    match self {
      Upstream::Push(s) => s.request(n),
      Upstream::Sync(s) => s.request(n),
    }
  }

  #[inline]
  fn cancel(&self) {
    match self {
      Upstream::Push(s) => s.cancel(),
      Upstream::Sync(s) => s.cancel(),
    }
  }
}

/// Install `upstream` into a subscriber's subscription slot, enforcing
/// the single-`on_subscribe` rule: a second subscription is cancelled
/// and reported as a protocol violation. Returns true if installed.
pub fn set_once<T: Send + 'static>(
  slot: &Mutex<Option<Upstream<T>>>,
  upstream: Upstream<T>,
) -> bool {
  {
    let mut guard = slot.lock().unwrap();
    if guard.is_none() {
      *guard = Some(upstream);
      return true;
    }
  }
  hooks::violation("on_subscribe called on a subscriber that already has a subscription");
  upstream.cancel();
  false
}
