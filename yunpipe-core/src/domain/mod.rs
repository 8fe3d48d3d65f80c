//! Core domain types
//!
//! This module contains the structures shared by the resource provider (which
//! creates what they describe) and the engine (which derives them from a
//! pipeline request).

pub mod descriptor;
pub mod manifest;
pub mod pipeline;
pub mod resource;
pub mod stage;
pub mod system;
pub mod task;
