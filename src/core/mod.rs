//! Core business logic module
//!
//! This module contains all business logic for copr-rebuild.
//! It has NO I/O operations - those belong in [`crate::infra`].
//!
//! # Submodules
//!
//! - [`package`] - Package metadata, build waves and results
//! - [`resolver`] - Dependency resolution into build waves
//! - [`status`] - Build status tokens
//! - [`service`] - Metadata provider and build service traits
//! - [`observer`] - Build progress observation
//! - [`orchestrator`] - Build orchestration logic
//! - [`manifest`] - Rebuild manifest (packages.toml) parsing and validation
//! - [`global_config`] - Global configuration management
//! - [`plan`] - Metadata collection and plan rendering

pub mod global_config;
pub mod manifest;
pub mod observer;
pub mod orchestrator;
pub mod package;
pub mod plan;
pub mod resolver;
pub mod service;
pub mod status;
