//! # Sampler Common Library
//!
//! Shared code for the sampler catalog services including:
//! - Catalog data model (presets and their samples)
//! - Preset name to folder/slug codec
//! - Configuration loading and root folder resolution
//! - Common error type

pub mod config;
pub mod error;
pub mod models;
pub mod naming;

pub use error::{Error, Result};
pub use models::{Preset, PresetDefinition, PresetFilter, Sample, MAX_SAMPLES_PER_PRESET};
