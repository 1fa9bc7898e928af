//! Deterministic random number generation
//!
//! Uses xorshift64* for fast, reproducible sampling.
//! All randomness in problems and arrival processes goes through this module.

mod xorshift;

pub use xorshift::RngManager;
