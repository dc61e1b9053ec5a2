//! Content fetcher for company homepages.
//!
//! This crate provides:
//! - [`ProxyFetcher`]: one rendered homepage capture per call through the scraping proxy
//! - [`FetchedContent`]: the opaque captured payload

pub mod proxy;

pub use proxy::{FetchedContent, ProxyFetcher, target_url};
