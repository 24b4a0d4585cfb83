//! Contract validation harness.
//!
//! The schemas and fixtures live in the workspace `contracts/` directory;
//! the checks themselves are the integration tests of this crate.
