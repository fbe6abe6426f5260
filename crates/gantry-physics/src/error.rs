//! Error types for the physics facade.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building or driving the physics engine.
#[derive(Error, Debug)]
pub enum PhysicsError {
    /// Configuration values are out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An SDK object could not be constructed during initialization.
    #[error("failed to initialize {component}: {reason}")]
    Initialization {
        /// The component being built (worker pool, pipeline, ...).
        component: &'static str,
        /// Reason for failure.
        reason: String,
    },

    /// A handle does not refer to an entry of its table.
    #[error("invalid {kind} handle [{index}] (table holds {len} entries)")]
    InvalidHandle {
        /// Table name ("mesh", "character").
        kind: &'static str,
        /// Offending index.
        index: usize,
        /// Current table length.
        len: usize,
    },

    /// Triangle mesh input was rejected.
    #[error("invalid triangle mesh: {0}")]
    InvalidMesh(String),

    /// Height-field input was rejected.
    #[error("invalid terrain: {0}")]
    InvalidTerrain(String),

    /// Character controller parameters were rejected.
    #[error("invalid character controller: {0}")]
    InvalidController(String),

    /// Scheduler frequency is not a positive finite number.
    #[error("invalid simulation frequency: {0}")]
    InvalidFrequency(f32),

    /// Simulation time step is negative or not finite.
    #[error("invalid time step: {0}")]
    InvalidTimeStep(f32),

    /// Reading a configuration file failed.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file is not valid TOML for [`crate::EngineConfig`].
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Result type for physics operations.
pub type Result<T> = std::result::Result<T, PhysicsError>;
