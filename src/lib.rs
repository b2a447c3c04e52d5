//! Watermelon API library
//!
//! Fetches the Watermelon Index company list, enriches each company with a US
//! stock ticker and serves the result as JSON. Exposed as a library so the
//! integration tests can drive the server in-process.

pub mod cache;
pub mod cli;
pub mod data;
pub mod pipeline;
pub mod server;
pub mod ticker;
