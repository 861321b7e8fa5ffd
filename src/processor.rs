//! Hot publishers that are also subscribers.

pub mod direct;

pub use self::direct::DirectProcessor;
