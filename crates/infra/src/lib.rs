//! Infrastructure adapters: in-memory implementations of the storage and
//! integration ports, plus cross-crate scenario tests.
//!
//! Everything here is process-local. The domain crates only see the port
//! traits, so swapping these adapters for database-backed ones is a wiring
//! change, not a domain change.

pub mod memory;
