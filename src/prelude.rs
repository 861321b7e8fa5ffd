//! Convenient imports for working with the crate.

pub use crate::{
  demand::{self, UNBOUNDED},
  error::SignalError,
  hooks,
  ops::{accumulate::Accumulate, retry_when::RetryWhen, PublisherExt},
  processor::direct::DirectProcessor,
  publisher::{
    empty, fail_with,
    fail::Fail,
    from_iterable::{from_iter, from_option_iter, from_try_iter, FromIterable},
    of, Publisher,
  },
  subscriber::{multi::SubscriptionArbiter, serialized::SerializedSubscriber, Subscriber},
  subscription::{
    deferred::DeferredSubscription, empty::EmptySubscription, set_once, Subscription,
    SyncSubscription, Upstream,
  },
  test_subscriber::TestSubscriber,
};
