//! Infrastructure layer
//!
//! Handles every side effect of kiln: reading build descriptions and
//! writing the generated graph. [`crate::core`] stays pure.

pub mod emit;
pub mod filesystem;
pub mod loader;
