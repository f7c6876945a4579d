//! # ms-core
//!
//! Core types for the minisel event-selection pipeline: the shared error
//! taxonomy and the typed selection configuration.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;

pub use config::{SelectionConfig, TreeStructure, TriggerGroup, TriggerMenu, WeightConfig};
pub use error::{Error, Result};
