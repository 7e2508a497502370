//! Reusable concurrent scenarios for corral collections.
//!
//! These exercise the coupling of the reference count, the reader/writer
//! lock and the tombstone flag under real thread interleavings. They are
//! `pub fn`s so integration tests can drive them against both facades.

pub mod collection_scenarios;
pub mod collection_stress;
pub mod probe;
