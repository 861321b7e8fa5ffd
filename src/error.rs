use std::{error::Error as StdError, sync::Arc};

use thiserror::Error;

/// The error type carried by `on_error` signals.
///
/// Protocol violations and source failures share one type so that any
/// error can flow through any subscription, and so errors can be
/// broadcast as items by [`DirectProcessor`](crate::processor::DirectProcessor)
/// in re-subscribing operators. User failures are held behind an `Arc`
/// to keep the type cheaply cloneable.
#[derive(Debug, Clone, Error)]
pub enum SignalError {
  /// `request` was called with a zero amount.
  #[error("request amount must be positive")]
  BadRequest,

  /// A source or callback was expected to yield a value and did not.
  #[error("{0} yielded no value")]
  MissingElement(&'static str),

  /// An item arrived with no outstanding demand to cover it.
  #[error("can't deliver value due to lack of requests")]
  Overflow,

  /// Failure raised by a source or a user callback.
  #[error("{0}")]
  Failure(Arc<dyn StdError + Send + Sync>),
}

impl SignalError {
  /// Wrap a source failure. Accepts anything convertible into a boxed
  /// error, including plain strings.
  pub fn failure(error: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
    SignalError::Failure(Arc::from(error.into()))
  }

  #[inline]
  pub fn is_bad_request(&self) -> bool { matches!(self, SignalError::BadRequest) }

  #[inline]
  pub fn is_missing_element(&self) -> bool { matches!(self, SignalError::MissingElement(_)) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn failure_keeps_message() {
    let err = SignalError::failure("forced failure");
    assert_eq!(err.to_string(), "forced failure");
  }

  #[test]
  fn failure_is_cloneable() {
    let err = SignalError::failure(std::io::Error::other("boom"));
    let clone = err.clone();
    assert_eq!(err.to_string(), clone.to_string());
  }

  #[test]
  fn violation_kinds_render() {
    assert_eq!(SignalError::BadRequest.to_string(), "request amount must be positive");
    assert_eq!(
      SignalError::MissingElement("iterator").to_string(),
      "iterator yielded no value"
    );
  }
}
