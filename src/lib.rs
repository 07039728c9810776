//! Strata — layered application settings
//!
//! Facade crate re-exporting the public surface of `strata-core`. See the
//! core crate for the full documentation.

pub use strata_core::*;
