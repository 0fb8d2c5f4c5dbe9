//! Integration test crate for the signing nodes.
//!
//! This crate has no library code. Its tests start several nodes on
//! loopback TCP inside one runtime and drive them through the control
//! socket, the same way an operator would.
//!
//! Run all integration tests, including the full-size roster:
//! ```sh
//! cargo test -p smpc-integration-tests -- --include-ignored
//! ```
