#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Common types and utilities for the edge-cloud workload orchestrator.
//!
//! This crate provides shared functionality across all orchestrator components.

pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;

/// Re-export commonly used external types.
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};