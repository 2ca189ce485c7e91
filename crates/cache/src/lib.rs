#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

//! Config-bound instance cache: reconciles long-lived resource
//! instances against their desired configuration.

pub mod instance_cache;

pub use instance_cache::ConfigBoundInstanceCache;