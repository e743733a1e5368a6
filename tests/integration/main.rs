//! ITP integration test harness.
//!
//! Every test starts a real server on a loopback port with its own
//! temporary resource root, and talks to it either through
//! `ClientSession` or with hand-built packets over a raw `TcpStream`.
//!
//!   cargo test --test integration
//!
//! Each test is responsible for stopping the server it starts.

mod fetch;
mod infra;
mod protocol;

pub use infra::*;
