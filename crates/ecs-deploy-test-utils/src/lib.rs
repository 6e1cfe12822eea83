//! Shared test utilities for ecs-deploy
//!
//! This crate provides common test fixtures that can be used across
//! unit and integration tests without circular dependencies.
//!
//! ## Modules
//!
//! - [`env`]: A complete deploy environment for the "demo" project
//! - [`manifest`]: Sample deployment manifests
//! - [`names`]: Unique names for test resources

pub mod env;
pub mod manifest;
pub mod names;

// Re-export commonly used items
pub use env::demo_env;
pub use manifest::sample_manifest;
pub use names::test_service_name;
