//! A Reactive Streams compliant publisher runtime.
//!
//! The crate provides the subscription protocol engine that bridges
//! demand-driven consumers with push-style producers under strict
//! backpressure: demand accounting, subscription arbiters, serialized
//! signal delivery, and the synchronous fusion extension, together with
//! the sources and operators built on top of that engine.
//!
//! ```rust
//! use rivulet::prelude::*;
//!
//! let ts = TestSubscriber::unbounded();
//! from_iter(1..=3).subscribe(ts.clone());
//!
//! ts.assert_values(&[1, 2, 3]);
//! ts.assert_complete();
//! ```

pub mod demand;
pub mod error;
pub mod hooks;
pub mod ops;
pub mod prelude;
pub mod processor;
pub mod publisher;
pub mod subscriber;
pub mod subscription;
pub mod test_subscriber;

pub use crate::{
  error::SignalError,
  publisher::Publisher,
  subscriber::Subscriber,
  subscription::{Subscription, SyncSubscription, Upstream},
};
