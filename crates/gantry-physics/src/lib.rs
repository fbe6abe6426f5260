#![warn(missing_docs)]

//! Fixed-step physics facade over Rapier3d.
//!
//! This crate wraps a Rapier scene behind a small engine type: cooked
//! triangle meshes and character controllers live in append-only tables
//! addressed by integer handles, and a wall-clock scheduler runs simulation
//! steps no more often than a requested frequency.
//!
//! # Features
//!
//! - Static triangle-mesh instances and height-field terrain
//! - Capsule character controllers with sweep-and-slide movement
//! - Frequency-limited stepping with a per-step callback
//! - Severity-tagged diagnostics routed to the `log` facade or a custom sink
//!
//! # Example
//!
//! ```ignore
//! use gantry_physics::{EngineConfig, PhysicsEngine};
//! use nalgebra::{UnitQuaternion, Vector3};
//!
//! let mut engine = PhysicsEngine::initialize(EngineConfig::default())?;
//! let character = engine.create_character_controller(Vector3::zeros(), 1.25, 0.2)?;
//!
//! let quad = [[-1.0, 0.0, -1.0], [-1.0, 0.0, 1.0], [1.0, 0.0, -1.0], [1.0, 0.0, 1.0]];
//! let mesh = engine.create_triangle_mesh(&quad, &[3u32, 2, 0, 3, 0, 1])?;
//! let (floor, flat) = (Vector3::new(0.0, -2.5, 0.0), UnitQuaternion::identity());
//! engine.create_static_mesh(mesh, floor, flat, Vector3::new(5.0, 1.0, 5.0))?;
//!
//! loop {
//!     engine.simulate_fixed_frequency_with(60.0, |engine, dt| {
//!         let _ = engine.move_character(character, Vector3::new(0.07, 0.0, 0.0), dt, true);
//!     })?;
//! }
//! ```

mod colliders;
mod config;
mod controller;
mod diagnostics;
mod engine;
mod error;
mod scheduler;
mod table;

pub use colliders::{cook_triangle_mesh, terrain_heights, CookedMesh, VertexPosition};
pub use config::{CharacterConfig, EngineConfig, MaterialConfig};
pub use controller::{
    CharacterController, CollisionFlags, ControllerDesc, CONTACT_OFFSET_FACTOR,
    STEP_OFFSET_FACTOR,
};
pub use diagnostics::{Diagnostic, DiagnosticSink, LogSink, MemorySink, Severity};
pub use engine::{ControllerHandle, MeshHandle, PhysicsEngine};
pub use error::{PhysicsError, Result};
pub use scheduler::{is_valid_frequency, FixedStepScheduler};
pub use table::{Handle, ResourceTable};
