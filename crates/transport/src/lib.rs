#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

//! Node-to-node HTTP transport: Controller forwarding and Scheduler
//! scenario/resource push clients.

pub mod node;

pub use node::{HttpNodeForwarder, NodeDirectory, SchedulerClient};