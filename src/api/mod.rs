//! HTTP client for the remote metadata platform.
//!
//! `Connection` carries the resolved endpoint and credential for one
//! workflow invocation; `retrieve` and `deploy` implement the two
//! asynchronous job flows on top of it.

mod client;
mod http;
mod poll;
mod types;

pub mod deploy;
pub mod retrieve;

pub use client::{Connection, ConnectionConfig};
pub use poll::PollConfig;
pub use types::{DeployOptions, RetrieveRequest, TestLevel};
