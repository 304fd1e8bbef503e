//! Infrastructure layer
//!
//! Handles all I/O operations: external processes and the filesystem.
//! This module is the only place where side effects occur.

pub mod copr;
pub mod dirs;
pub mod koji;
pub mod process;
