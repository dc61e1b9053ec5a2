//! Core enrichment workflows for EnrichKit.
//!
//! This crate ties the fetcher and the storage worker together into the
//! batch scrape workflow, and owns the two-phase result logging.

pub mod batch;
pub mod forwarder;
pub mod logger;

pub use batch::BatchRunner;
pub use forwarder::{ForwardEnvelope, HomepageData, StorageForwarder};
pub use logger::{CompletionOutcome, LogReceipt, ResultLogger};
