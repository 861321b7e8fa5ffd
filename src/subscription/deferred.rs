//! Arbiter for a subscription that has not arrived yet.

use std::sync::{Arc, Mutex};

use crate::{
  demand,
  hooks,
  subscription::Subscription,
};

/// Holds at most one real subscription, buffering demand and
/// cancellation issued before it arrives.
///
/// `request` before `set` accumulates saturating pending demand that is
/// forwarded the moment the subscription is installed. A `set` after
/// cancellation cancels the incoming subscription; a second `set`
/// cancels the incoming subscription and reports a violation.
///
/// Downstream calls are always made with the internal lock released, so
/// a source that emits synchronously from inside `request` (a companion
/// stream feeding a re-subscription loop) can re-enter safely.
pub struct DeferredSubscription {
  state: Mutex<DeferredState>,
}

struct DeferredState {
  subscription: Option<Arc<dyn Subscription>>,
  requested: u64,
  cancelled: bool,
}

enum SetOutcome {
  Installed(u64),
  AlreadySet,
  Cancelled,
}

impl DeferredSubscription {
  pub fn new() -> Self {
    DeferredSubscription {
      state: Mutex::new(DeferredState { subscription: None, requested: 0, cancelled: false }),
    }
  }

  /// Install the real subscription. Forwards any pending demand.
  /// Returns true if this call installed it.
  pub fn set(&self, subscription: Arc<dyn Subscription>) -> bool {
    let outcome = {
      let mut state = self.state.lock().unwrap();
      if state.cancelled {
        SetOutcome::Cancelled
      } else if state.subscription.is_some() {
        SetOutcome::AlreadySet
      } else {
        state.subscription = Some(subscription.clone());
        SetOutcome::Installed(std::mem::take(&mut state.requested))
      }
    };
    match outcome {
      SetOutcome::Installed(pending) => {
        if pending != 0 {
          subscription.request(pending);
        }
        true
      }
      SetOutcome::AlreadySet => {
        hooks::violation("deferred subscription set more than once");
        subscription.cancel();
        false
      }
      SetOutcome::Cancelled => {
        subscription.cancel();
        false
      }
    }
  }

  pub fn is_cancelled(&self) -> bool { self.state.lock().unwrap().cancelled }
}

impl Default for DeferredSubscription {
  fn default() -> Self { Self::new() }
}

impl Subscription for DeferredSubscription {
  fn request(&self, n: u64) {
    if !demand::validate(n) {
      return;
    }
    let target = {
      let mut state = self.state.lock().unwrap();
      if state.cancelled {
        None
      } else {
        match &state.subscription {
          Some(s) => Some(s.clone()),
          None => {
            state.requested = demand::add_cap_val(state.requested, n);
            None
          }
        }
      }
    };
    if let Some(s) = target {
      s.request(n);
    }
  }

  fn cancel(&self) {
    let target = {
      let mut state = self.state.lock().unwrap();
      state.cancelled = true;
      state.subscription.take()
    };
    if let Some(s) = target {
      s.cancel();
    }
  }
}
