//! Property-based fuzzing harness for the MapSheet core.
//!
//! Generalizes single-function numerical-stability checks into
//! whole-sheet invariant checks over random parameter sets and
//! sounding batches.
//!
//! This crate has no public API of its own; `strategies` builds the
//! `proptest::Strategy` generators and `invariants` holds the
//! `#[cfg(test)]` properties themselves, one module per invariant.

pub mod strategies;

#[cfg(test)]
mod invariants;
