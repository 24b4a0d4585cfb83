//! Latency smoke checks for the parse, encode, and render path.
//!
//! The checks are integration tests of this crate.
