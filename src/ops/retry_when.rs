//! Re-subscription driven by a companion stream.

use std::{
  marker::PhantomData,
  sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc, Weak,
  },
};

use crate::{
  error::SignalError,
  processor::direct::DirectProcessor,
  publisher::Publisher,
  subscriber::{multi::SubscriptionArbiter, serialized::SerializedSubscriber, Subscriber},
  subscription::{deferred::DeferredSubscription, empty::EmptySubscription, Subscription, Upstream},
};

/// Retries a source when a companion stream signals a value in response
/// to the source's error.
///
/// On subscribe, `handler` is invoked with a hot error stream; every
/// error from the source is fed into that stream instead of reaching the
/// downstream. A value signalled by the handler's companion publisher
/// triggers one re-subscription to the source; a terminal signal from
/// the companion becomes the downstream's terminal signal. If the
/// companion signals while the source is active, the terminal wins
/// immediately; once the source completes normally the companion is
/// disconnected and ignored.
#[derive(Clone)]
pub struct RetryWhen<P, F> {
  source: P,
  handler: F,
}

impl<P, F> RetryWhen<P, F> {
  pub fn new(source: P, handler: F) -> Self { RetryWhen { source, handler } }
}

impl<P, F, C> Publisher for RetryWhen<P, F>
where
  P: Publisher + Clone + Send + Sync + 'static,
  F: Fn(DirectProcessor<SignalError>) -> C,
  C: Publisher,
{
  type Item = P::Item;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = P::Item>>) {
    let signals = DirectProcessor::<SignalError>::new();

    // Errors are fed to the companion through a serialized view, since
    // consecutive upstream subscriptions may signal from different
    // threads.
    let signaller =
      SerializedSubscriber::new(Arc::new(signals.clone()) as Arc<dyn Subscriber<Item = SignalError>>);
    signaller.on_subscribe(Upstream::Push(Arc::new(EmptySubscription)));

    let main = Arc::new_cyclic(|weak: &Weak<RetryWhenMain<P>>| RetryWhenMain {
      this: weak.clone(),
      actual: SerializedSubscriber::new(subscriber),
      signaller,
      source: self.source.clone(),
      arbiter: SubscriptionArbiter::new(),
      when_arbiter: DeferredSubscription::new(),
      wip: AtomicUsize::new(0),
      cancelled: AtomicBool::new(false),
      produced: AtomicU64::new(0),
    });

    // The downstream sees exactly one subscription: the main wrapper.
    main.actual.on_subscribe(Upstream::Push(main.clone()));

    let companion = (self.handler)(signals);

    let other = Arc::new(RetryWhenOther { main: main.clone(), _marker: PhantomData });
    companion.subscribe(other);

    if !main.cancelled.load(Ordering::SeqCst) {
      self.source.subscribe(main);
    }
  }
}

struct RetryWhenMain<P: Publisher> {
  this: Weak<Self>,
  actual: SerializedSubscriber<P::Item>,
  signaller: SerializedSubscriber<SignalError>,
  source: P,
  /// Swaps upstream subscriptions while preserving outstanding demand.
  arbiter: SubscriptionArbiter,
  /// Holds the companion subscription, which may arrive after the first
  /// error has already requested from it.
  when_arbiter: DeferredSubscription,
  wip: AtomicUsize,
  cancelled: AtomicBool,
  produced: AtomicU64,
}

impl<P> RetryWhenMain<P>
where
  P: Publisher + Clone + Send + Sync + 'static,
{
  fn set_when(&self, subscription: Arc<dyn Subscription>) { self.when_arbiter.set(subscription); }

  /// Re-subscribe the source at most once per companion tick. The
  /// work-in-progress counter turns re-entrant ticks (a synchronous
  /// source failing again during the re-subscription) into iterations
  /// of the drain loop instead of recursion.
  fn resubscribe(&self) {
    if self.wip.fetch_add(1, Ordering::SeqCst) != 0 {
      return;
    }
    loop {
      if self.cancelled.load(Ordering::SeqCst) {
        return;
      }
      if let Some(this) = self.this.upgrade() {
        self.source.subscribe(this);
      }
      if self.wip.fetch_sub(1, Ordering::SeqCst) == 1 {
        return;
      }
    }
  }

  fn when_error(&self, error: SignalError) {
    self.cancelled.store(true, Ordering::SeqCst);
    self.arbiter.cancel();
    self.actual.on_error(error);
  }

  fn when_complete(&self) {
    self.cancelled.store(true, Ordering::SeqCst);
    self.arbiter.cancel();
    self.actual.on_complete();
  }
}

impl<P> Subscriber for RetryWhenMain<P>
where
  P: Publisher + Clone + Send + Sync + 'static,
{
  type Item = P::Item;

  fn on_subscribe(&self, upstream: Upstream<P::Item>) {
    // Every re-subscription lands here; the arbiter folds the swap into
    // the downstream's single stable subscription.
    self.arbiter.set(Arc::new(upstream));
  }

  fn on_next(&self, value: P::Item) {
    self.actual.on_next(value);
    self.produced.fetch_add(1, Ordering::SeqCst);
  }

  fn on_error(&self, error: SignalError) {
    let produced = self.produced.swap(0, Ordering::SeqCst);
    if produced != 0 {
      self.arbiter.produced(produced);
    }
    self.when_arbiter.request(1);
    self.signaller.on_next(error);
  }

  fn on_complete(&self) {
    self.when_arbiter.cancel();
    self.actual.on_complete();
  }
}

impl<P> Subscription for RetryWhenMain<P>
where
  P: Publisher + Clone + Send + Sync + 'static,
{
  fn request(&self, n: u64) { self.arbiter.request(n); }

  fn cancel(&self) {
    if self.cancelled.swap(true, Ordering::SeqCst) {
      return;
    }
    self.when_arbiter.cancel();
    self.arbiter.cancel();
  }
}

/// Subscribes to the companion publisher and translates its signals
/// into control decisions on the main flow.
struct RetryWhenOther<P: Publisher, U> {
  main: Arc<RetryWhenMain<P>>,
  _marker: PhantomData<fn(U)>,
}

impl<P, U> Subscriber for RetryWhenOther<P, U>
where
  P: Publisher + Clone + Send + Sync + 'static,
  U: Send + 'static,
{
  type Item = U;

  fn on_subscribe(&self, upstream: Upstream<U>) { self.main.set_when(Arc::new(upstream)); }

  fn on_next(&self, _value: U) { self.main.resubscribe(); }

  fn on_error(&self, error: SignalError) { self.main.when_error(error); }

  fn on_complete(&self) { self.main.when_complete(); }
}
