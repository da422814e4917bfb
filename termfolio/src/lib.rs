//! termfolio - terminal-style portfolio chat server
//!
//! Library target exists so the router can be exercised by integration
//! tests; the binary in `main.rs` is the actual deployment entry point.

pub mod server;
