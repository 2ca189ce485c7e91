#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

//! Durable distributor store (SQLite/WAL) and its internal HTTP
//! surface for result submission and polling.

pub mod distributor;
pub mod http;

pub use distributor::SqliteDistributor;
pub use http::{router, DistributorState};