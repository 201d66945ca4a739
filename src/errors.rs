//! Error Types
//!
//! This module defines the error types used throughout the pipeline.
//!
//! # Overview
//!
//! The main error type [`PipelineError`] covers every failure mode of the
//! pipeline core:
//! - Malformed plugin / day-time / effect descriptors
//! - Rejected setting assignments
//! - Unknown plugins at load time
//! - Shader compilation failures during a reload
//!
//! # Propagation
//!
//! Load-time and reload-time errors are fatal to the operation that raised
//! them and carry the plugin id, stage name or effect source that caused them.
//! Setting changes requested at runtime for unknown ids are the one tolerant
//! path: they are logged and ignored instead of producing an error.
//!
//! ```rust,ignore
//! use dusk::errors::{PipelineError, Result};
//!
//! fn reload(pipeline: &mut RenderPipeline) -> Result<()> {
//!     pipeline.reload_shaders()?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The reason a setting assignment was refused.
///
/// The setting keeps its previous value whenever one of these is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The value has the wrong type for the setting (e.g. a string for a bool).
    #[error("expected a {expected} value, got {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// A numeric value lies outside the declared range.
    #[error("value {value} is outside the range [{min}, {max}]")]
    OutOfRange {
        value: String,
        min: String,
        max: String,
    },

    /// An enum value that is not one of the declared alternatives.
    #[error("'{value}' is not one of {allowed:?}")]
    UnknownVariant { value: String, allowed: Vec<String> },

    /// A power-of-two setting received a value that is not a power of two.
    #[error("{0} is not a power of two")]
    NotPowerOfTwo(i64),

    /// A time or scalar that must be finite was NaN or infinite.
    #[error("{0} is not a finite number")]
    NotFinite(f32),
}

/// The main error type for the pipeline core.
#[derive(Error, Debug)]
pub enum PipelineError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Malformed or unknown descriptor content.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A setting assignment was rejected.
    #[error("Invalid setting value: {0}")]
    Validation(#[from] ValidationError),

    /// The requested plugin or setting does not exist.
    #[error("Not found: {plugin}/{setting}")]
    NotFound { plugin: String, setting: String },

    // ========================================================================
    // Plugin Errors
    // ========================================================================
    /// A plugin could not be instantiated.
    #[error("Failed to load plugin '{plugin}': {reason}")]
    PluginLoad { plugin: String, reason: String },

    /// A plugin hook failed.
    #[error("Plugin '{plugin}' failed in hook '{hook}': {source}")]
    Hook {
        plugin: String,
        hook: &'static str,
        #[source]
        source: Box<PipelineError>,
    },

    // ========================================================================
    // Effect Errors
    // ========================================================================
    /// The effect declaration could not be resolved.
    #[error("Could not apply effect '{source_path}': {reason}")]
    Effect { source_path: String, reason: String },

    /// An effect enables both the deferred and the forward pass.
    #[error(
        "Effect '{source_path}' renders both forward and deferred; \
         use either render_gbuffer or render_forward, but not both"
    )]
    PassConflict { source_path: String },

    // ========================================================================
    // Shader Errors
    // ========================================================================
    /// A shader program failed to compile during a reload.
    #[error("Failed to compile shader '{program}' of '{stage}': {message}")]
    ShaderCompile {
        stage: String,
        program: String,
        message: String,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// The operation is not valid in the pipeline's current state.
    #[error("Invalid pipeline state: {0}")]
    InvalidState(String),

    // ========================================================================
    // I/O & Format Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Shader configuration template error.
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
}

impl PipelineError {
    /// Returns `true` for errors caused by invalid configuration content,
    /// including the gbuffer/forward pass conflict.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config(_) | Self::PassConflict { .. })
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Alias for `Result<T, PipelineError>`.
pub type Result<T> = std::result::Result<T, PipelineError>;
