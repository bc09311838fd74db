//! Content-addressed cache for quest enrichments.
//!
//! This crate provides:
//! - [`Fingerprint`]: stable key over a quest's id, objective text and item imagery
//! - [`ContentCache`]: sharded, capacity- and TTL-bounded store
//! - [`Clock`]: injectable time source ([`SystemClock`], [`ManualClock`])

pub mod clock;
pub mod fingerprint;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use fingerprint::Fingerprint;
pub use store::{CacheStats, ContentCache};
