//! Demand accounting for backpressured subscriptions.
//!
//! A subscription's outstanding demand is a non-negative `u64` with
//! [`UNBOUNDED`] as an absorbing sentinel: once a counter saturates to
//! unbounded it is never decremented and further additions are ignored.
//! The counter doubles as the emission-ownership signal: the caller that
//! observes the 0-to-positive transition in [`add_cap`] owns the drain.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::hooks;

/// Demand sentinel treated as "no backpressure".
pub const UNBOUNDED: u64 = u64::MAX;

/// True iff `n` is a valid request amount.
#[inline]
pub fn validate(n: u64) -> bool { n != 0 }

/// Saturating add for demand counters guarded by a lock.
#[inline]
pub fn add_cap_val(current: u64, n: u64) -> u64 { current.saturating_add(n) }

/// Atomically add `n` to `requested`, capping at [`UNBOUNDED`].
///
/// Returns the pre-update value, so a `0` return means the caller took
/// the counter from empty to positive and now owns emission.
pub fn add_cap(requested: &AtomicU64, n: u64) -> u64 {
  let mut current = requested.load(Ordering::SeqCst);
  loop {
    if current == UNBOUNDED {
      return UNBOUNDED;
    }
    let next = add_cap_val(current, n);
    match requested.compare_exchange_weak(current, next, Ordering::SeqCst, Ordering::SeqCst) {
      Ok(_) => return current,
      Err(actual) => current = actual,
    }
  }
}

/// Atomically subtract `n` items actually emitted from `requested`.
///
/// No-op when the counter is unbounded. Driving the counter below zero
/// is a protocol bug; the counter is clamped at zero and the violation
/// is routed to the hooks. Returns the post-update value.
pub fn produced(requested: &AtomicU64, n: u64) -> u64 {
  let mut current = requested.load(Ordering::SeqCst);
  loop {
    if current == UNBOUNDED {
      return UNBOUNDED;
    }
    let (next, underflow) = match current.checked_sub(n) {
      Some(next) => (next, false),
      None => (0, true),
    };
    match requested.compare_exchange_weak(current, next, Ordering::SeqCst, Ordering::SeqCst) {
      Ok(_) => {
        if underflow {
          hooks::violation("more items produced than requested");
        }
        return next;
      }
      Err(actual) => current = actual,
    }
  }
}
