// Core domain logic for the MailGuard ingestion pipeline
//
// This crate is I/O-free: event classification, the TTL read-cache, and the
// shared error taxonomy live here and are exercised by the storage, notify,
// and api crates.

pub mod cache;
pub mod classifier;
pub mod error;
pub mod event;

pub use cache::{CacheKey, CacheLookup, CacheStatus, ReadCache};
pub use classifier::classify;
pub use error::{MailGuardError, Result};
pub use event::{
    Classification, DetectionMethod, DeviceBaseline, EventType, SensorReading, WeightSummary,
};
