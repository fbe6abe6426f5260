//! Capsule character controllers.

use std::fmt;

use bitflags::bitflags;
use nalgebra::{UnitVector3, Vector3};
use rapier3d::control::{CharacterAutostep, CharacterLength, KinematicCharacterController};
use rapier3d::geometry::ColliderHandle;

use crate::config::CharacterConfig;
use crate::error::{PhysicsError, Result};

/// Contact offset as a multiple of the capsule radius.
pub const CONTACT_OFFSET_FACTOR: f32 = 1.1;

/// Step offset as a fraction of the capsule height.
pub const STEP_OFFSET_FACTOR: f32 = 0.25;

/// Shape and tuning of a capsule controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerDesc {
    /// Distance between the centers of the two hemispheres.
    pub height: f32,
    /// Capsule radius.
    pub radius: f32,
    /// Contact offset, measured from the capsule axis.
    pub contact_offset: f32,
    /// Tallest obstacle the character climbs without jumping.
    pub step_offset: f32,
}

impl ControllerDesc {
    /// Capsule with the derived offsets.
    pub fn capsule(height: f32, radius: f32) -> Self {
        Self {
            height,
            radius,
            contact_offset: radius * CONTACT_OFFSET_FACTOR,
            step_offset: height * STEP_OFFSET_FACTOR,
        }
    }

    /// Reject degenerate capsules.
    pub fn validate(&self) -> Result<()> {
        if !(self.height.is_finite() && self.height > 0.0) {
            return Err(PhysicsError::InvalidController(format!(
                "height must be positive, got {}",
                self.height
            )));
        }
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(PhysicsError::InvalidController(format!(
                "radius must be positive, got {}",
                self.radius
            )));
        }
        Ok(())
    }

    /// Skin kept between the capsule surface and obstacles.
    pub fn skin_width(&self) -> f32 {
        self.contact_offset - self.radius
    }
}

bitflags! {
    /// Which sides of the capsule touched something during a move.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CollisionFlags: u8 {
        /// Touched along the sides.
        const SIDES = 1;
        /// Touched the ceiling.
        const UP = 1 << 1;
        /// Touched the ground.
        const DOWN = 1 << 2;
    }
}

impl CollisionFlags {
    /// Classify contacts of one move.
    ///
    /// `normals` are contact normals pointing from the obstacle towards the
    /// character. A normal within `walkable_cos` of `up` is ground, within
    /// `walkable_cos` of `-up` is ceiling, anything else is a side hit.
    pub fn from_contacts(
        grounded: bool,
        normals: impl IntoIterator<Item = Vector3<f32>>,
        up: &UnitVector3<f32>,
        walkable_cos: f32,
    ) -> Self {
        let mut flags = if grounded { Self::DOWN } else { Self::empty() };
        for normal in normals {
            let alignment = up.dot(&normal);
            flags |= if alignment >= walkable_cos {
                Self::DOWN
            } else if alignment <= -walkable_cos {
                Self::UP
            } else {
                Self::SIDES
            };
        }
        flags
    }
}

/// A registered character: controller tuning plus the capsule collider it moves.
pub struct CharacterController {
    pub(crate) controller: KinematicCharacterController,
    pub(crate) collider: ColliderHandle,
    desc: ControllerDesc,
    position: Vector3<f32>,
}

impl CharacterController {
    pub(crate) fn new(
        desc: ControllerDesc,
        collider: ColliderHandle,
        position: Vector3<f32>,
        up: UnitVector3<f32>,
        config: &CharacterConfig,
    ) -> Self {
        let controller = KinematicCharacterController {
            up,
            offset: CharacterLength::Absolute(desc.skin_width()),
            autostep: Some(CharacterAutostep {
                max_height: CharacterLength::Absolute(desc.step_offset),
                min_width: CharacterLength::Absolute(desc.radius),
                include_dynamic_bodies: false,
            }),
            max_slope_climb_angle: config.max_slope_climb_deg.to_radians(),
            snap_to_ground: config
                .snap_to_ground
                .then_some(CharacterLength::Absolute(desc.step_offset)),
            ..Default::default()
        };

        Self {
            controller,
            collider,
            desc,
            position,
        }
    }

    /// Center of the capsule.
    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    /// Shape and offsets.
    pub fn desc(&self) -> &ControllerDesc {
        &self.desc
    }

    /// Up direction used for slope and ground checks.
    pub fn up(&self) -> UnitVector3<f32> {
        self.controller.up
    }

    pub(crate) fn set_position(&mut self, position: Vector3<f32>) {
        self.position = position;
    }
}

impl fmt::Debug for CharacterController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CharacterController")
            .field("collider", &self.collider)
            .field("desc", &self.desc)
            .field("position", &self.position)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_derived_offsets() {
        let desc = ControllerDesc::capsule(1.2, 0.3);
        assert_relative_eq!(desc.contact_offset, 0.33, epsilon = 1e-6);
        assert_relative_eq!(desc.step_offset, 0.3, epsilon = 1e-6);
        assert_relative_eq!(desc.skin_width(), 0.03, epsilon = 1e-6);
        assert!(desc.validate().is_ok());
    }

    #[test]
    fn test_rejects_degenerate_capsule() {
        assert!(ControllerDesc::capsule(0.0, 0.3).validate().is_err());
        assert!(ControllerDesc::capsule(1.0, -0.1).validate().is_err());
        assert!(ControllerDesc::capsule(f32::NAN, 0.3).validate().is_err());
    }

    #[test]
    fn test_flags_from_contacts() {
        let up = Vector3::y_axis();
        let walkable = 45.0f32.to_radians().cos();

        let ground = CollisionFlags::from_contacts(false, [Vector3::y()], &up, walkable);
        assert_eq!(ground, CollisionFlags::DOWN);

        let ceiling = CollisionFlags::from_contacts(false, [-Vector3::y()], &up, walkable);
        assert_eq!(ceiling, CollisionFlags::UP);

        let wall_and_floor =
            CollisionFlags::from_contacts(true, [Vector3::x()], &up, walkable);
        assert!(wall_and_floor.contains(CollisionFlags::SIDES | CollisionFlags::DOWN));
        assert!(!wall_and_floor.contains(CollisionFlags::UP));

        let nothing = CollisionFlags::from_contacts(false, std::iter::empty(), &up, walkable);
        assert!(nothing.is_empty());
    }

    #[test]
    fn test_flag_bits() {
        let flags = CollisionFlags::SIDES | CollisionFlags::DOWN;
        assert_eq!(flags.bits(), 0b101);
        assert_eq!(CollisionFlags::from_bits(0b010), Some(CollisionFlags::UP));
        assert_eq!(CollisionFlags::from_bits(0b1000), None);
    }

    #[test]
    fn test_capsule_offsets_scale_with_size() {
        let small = ControllerDesc::capsule(0.5, 0.1);
        let large = ControllerDesc::capsule(2.0, 0.4);
        assert!(small.validate().is_ok());
        assert!(large.validate().is_ok());
        assert!(large.skin_width() > small.skin_width());
        assert_relative_eq!(large.step_offset, 0.5, epsilon = 1e-6);
    }
}
