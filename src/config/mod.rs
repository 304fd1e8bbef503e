//! Configuration constants
//!
//! - [`defaults`] - Default values for tunables
//! - [`urls`] - Well-known service endpoints

pub mod defaults;
pub mod urls;
