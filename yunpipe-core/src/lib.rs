//! Yunpipe Core
//!
//! Core types and abstractions for the yunpipe pipeline provisioner.
//!
//! This crate contains:
//! - Domain types: algorithm descriptors, pipeline and stage requests,
//!   resource references, task definitions and the cleanup manifest
//! - The error taxonomy shared by the provider and the engine
//! - Name generation for pipeline-scoped resources

pub mod domain;
pub mod error;
pub mod names;

pub use error::{ProvisionError, ResourceKind, Result};
