//! Engine configuration, loadable from TOML.

use std::path::Path;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, Result};

/// Surface properties applied to every collider the engine creates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialConfig {
    /// Friction coefficient.
    pub friction: f32,
    /// Restitution (bounciness), 0 to 1.
    pub restitution: f32,
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            friction: 0.5,
            restitution: 0.6,
        }
    }
}

/// Tuning shared by all character controllers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterConfig {
    /// Displacements shorter than this are not applied.
    pub min_move_distance: f32,
    /// Steepest slope a character can walk up (degrees).
    pub max_slope_climb_deg: f32,
    /// Keep characters glued to the ground when stepping down.
    pub snap_to_ground: bool,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            min_move_distance: 1e-6,
            max_slope_climb_deg: 45.0,
            snap_to_ground: true,
        }
    }
}

/// Parameters for [`crate::PhysicsEngine::initialize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads used by a simulation step.
    ///
    /// Steps only spread across the pool when the `parallel` feature is on.
    pub thread_count: usize,
    /// Gravity acceleration vector.
    pub gravity: [f32; 3],
    /// Default material.
    pub material: MaterialConfig,
    /// Character controller tuning.
    pub character: CharacterConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thread_count: 2,
            gravity: [0.0, -9.81, 0.0],
            material: MaterialConfig::default(),
            character: CharacterConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Default configuration with the given worker count and gravity.
    pub fn new(thread_count: usize, gravity: Vector3<f32>) -> Self {
        Self {
            thread_count,
            gravity: gravity.into(),
            ..Default::default()
        }
    }

    /// Parse a configuration from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PhysicsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Gravity as a vector.
    pub fn gravity_vector(&self) -> Vector3<f32> {
        Vector3::from(self.gravity)
    }

    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if self.thread_count == 0 {
            return Err(PhysicsError::InvalidConfig(
                "thread_count must be at least 1".into(),
            ));
        }
        if self.gravity.iter().any(|g| !g.is_finite()) {
            return Err(PhysicsError::InvalidConfig(
                "gravity must be finite".into(),
            ));
        }
        if self.material.friction.is_nan() || self.material.friction < 0.0 {
            return Err(PhysicsError::InvalidConfig(
                "material.friction must be non-negative".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.material.restitution) {
            return Err(PhysicsError::InvalidConfig(
                "material.restitution must be between 0 and 1".into(),
            ));
        }
        let min_move = self.character.min_move_distance;
        if min_move.is_nan() || min_move < 0.0 {
            return Err(PhysicsError::InvalidConfig(
                "character.min_move_distance must be non-negative".into(),
            ));
        }
        let slope = self.character.max_slope_climb_deg;
        if slope.is_nan() || slope <= 0.0 || slope > 90.0 {
            return Err(PhysicsError::InvalidConfig(
                "character.max_slope_climb_deg must be in (0, 90]".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.thread_count, 2);
        assert_eq!(config.gravity, [0.0, -9.81, 0.0]);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            thread_count = 4

            [material]
            friction = 0.8
            "#,
        )
        .unwrap();

        assert_eq!(config.thread_count, 4);
        assert_eq!(config.gravity, [0.0, -9.81, 0.0]);
        assert_eq!(config.material.friction, 0.8);
        assert_eq!(config.material.restitution, 0.6);
        assert_eq!(config.character, CharacterConfig::default());
    }

    #[test]
    fn test_rejects_zero_threads() {
        let err = EngineConfig::from_toml_str("thread_count = 0").unwrap_err();
        assert!(matches!(err, PhysicsError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_bad_restitution() {
        let mut config = EngineConfig::default();
        config.material.restitution = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = EngineConfig::from_toml_str("gravity = \"down\"").unwrap_err();
        assert!(matches!(err, PhysicsError::ConfigParse(_)));
    }

    #[test]
    fn test_serialize_round_trip() {
        let config = EngineConfig::new(3, Vector3::new(0.0, 0.0, -9.81));
        let text = toml::to_string(&config).unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::load("/nonexistent/gantry.toml").unwrap_err();
        assert!(matches!(err, PhysicsError::Io { .. }));
    }
}
