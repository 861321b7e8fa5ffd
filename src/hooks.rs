//! Process-wide sinks for signals that can no longer be delivered.
//!
//! The Reactive Streams contract allows at most one terminal signal per
//! subscription, so an error that surfaces after termination has nowhere
//! to go. These hooks give such signals a destination instead of silently
//! discarding them. Each hook defaults to a `tracing` event and can be
//! replaced at runtime, which the test suite uses to capture drops.

use std::sync::{Arc, Mutex, RwLock};

use lazy_static::lazy_static;

use crate::error::SignalError;

pub type ErrorHook = Arc<dyn Fn(&SignalError) + Send + Sync>;
pub type ValueHook = Arc<dyn Fn() + Send + Sync>;
pub type ViolationHook = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct Hooks {
  error_dropped: Option<ErrorHook>,
  value_dropped: Option<ValueHook>,
  violation: Option<ViolationHook>,
}

lazy_static! {
  static ref HOOKS: RwLock<Hooks> = RwLock::new(Hooks::default());
}

/// Route an error that arrived after its subscription terminated.
pub fn error_dropped(error: &SignalError) {
  let hook = HOOKS.read().unwrap().error_dropped.clone();
  match hook {
    Some(hook) => hook(error),
    None => tracing::warn!(%error, "error signal dropped after termination"),
  }
}

/// Route a value that arrived after its subscription terminated.
pub fn value_dropped() {
  let hook = HOOKS.read().unwrap().value_dropped.clone();
  match hook {
    Some(hook) => hook(),
    None => tracing::debug!("value signal dropped after termination"),
  }
}

/// Report a protocol violation observed where no subscriber can be told,
/// such as a duplicate `on_subscribe` or a produced-count underflow.
pub fn violation(message: &str) {
  let hook = HOOKS.read().unwrap().violation.clone();
  match hook {
    Some(hook) => hook(message),
    None => tracing::warn!("reactive streams protocol violation: {message}"),
  }
}

/// Install a new dropped-error hook, returning the previous one.
/// `None` restores the default `tracing` sink.
pub fn set_error_dropped_hook(hook: Option<ErrorHook>) -> Option<ErrorHook> {
  std::mem::replace(&mut HOOKS.write().unwrap().error_dropped, hook)
}

/// Install a new dropped-value hook, returning the previous one.
pub fn set_value_dropped_hook(hook: Option<ValueHook>) -> Option<ValueHook> {
  std::mem::replace(&mut HOOKS.write().unwrap().value_dropped, hook)
}

/// Install a new violation hook, returning the previous one.
pub fn set_violation_hook(hook: Option<ViolationHook>) -> Option<ViolationHook> {
  std::mem::replace(&mut HOOKS.write().unwrap().violation, hook)
}

lazy_static! {
  /// Serializes tests that install global hooks.
  static ref HOOK_TEST_GUARD: Mutex<()> = Mutex::new(());
}

/// Run `f` with a capturing error hook installed, restoring the previous
/// hook afterwards. Exposed for the crate's own tests.
#[doc(hidden)]
pub fn with_error_capture<R>(capture: ErrorHook, f: impl FnOnce() -> R) -> R {
  let _guard = HOOK_TEST_GUARD.lock().unwrap();
  let previous = set_error_dropped_hook(Some(capture));
  let result = f();
  set_error_dropped_hook(previous);
  result
}
