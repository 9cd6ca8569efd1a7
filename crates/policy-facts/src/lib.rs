//! TTL-cached subject and resource fact resolution (C7, §4.7). I/O-bearing by design —
//! every public entry point here is `async` and may suspend on a backing [`FactsSource`].

#![deny(unsafe_code)]

mod cache;
mod provider;
mod source;

pub use provider::{FactsCacheConfig, FactsProvider};
pub use source::FactsSource;
