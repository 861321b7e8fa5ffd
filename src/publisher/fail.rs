use std::{marker::PhantomData, sync::Arc};

use crate::{
  error::SignalError,
  publisher::Publisher,
  subscriber::Subscriber,
  subscription::empty,
};

/// A source that terminates every subscriber immediately with a fixed
/// error.
#[derive(Clone)]
pub struct Fail<T> {
  error: SignalError,
  _marker: PhantomData<fn() -> T>,
}

impl<T> Fail<T> {
  pub fn new(error: SignalError) -> Self { Fail { error, _marker: PhantomData } }
}

impl<T: Send + 'static> Publisher for Fail<T> {
  type Item = T;

  fn subscribe(&self, subscriber: Arc<dyn Subscriber<Item = T>>) {
    empty::error(&subscriber, self.error.clone());
  }
}
