#![doc = include_str!("../README.md")]
#![deny(missing_docs)]

mod cache;
mod list;

pub use cache::LruCache;

#[cfg(not(feature = "ahash"))]
type RandomState = std::hash::RandomState;
#[cfg(feature = "ahash")]
type RandomState = ahash::RandomState;
