//! The physics engine facade over Rapier3d.

use std::time::Instant;

use nalgebra::{Isometry3, UnitQuaternion, UnitVector3, Vector3};
use parry3d::shape::SharedShape;
use rapier3d::dynamics::{
    CCDSolver, ImpulseJointSet, IntegrationParameters, IslandManager, MultibodyJointSet,
    RigidBodySet,
};
use rapier3d::geometry::{BroadPhaseMultiSap, ColliderBuilder, ColliderSet, NarrowPhase};
use rapier3d::pipeline::{PhysicsPipeline, QueryFilter, QueryPipeline};

use crate::colliders::{cook_triangle_mesh, terrain_heights, CookedMesh, VertexPosition};
use crate::config::EngineConfig;
use crate::controller::{CharacterController, CollisionFlags, ControllerDesc};
use crate::diagnostics::{Diagnostic, DiagnosticSink, LogSink, Severity};
use crate::error::{PhysicsError, Result};
use crate::scheduler::{is_valid_frequency, FixedStepScheduler};
use crate::table::{Handle, ResourceTable};

/// Handle of a cooked triangle mesh.
pub type MeshHandle = Handle<CookedMesh>;

/// Handle of a character controller.
pub type ControllerHandle = Handle<CharacterController>;

/// A single physics scene with its meshes and character controllers.
///
/// Construction is initialization: a `PhysicsEngine` value is always ready to
/// simulate.
pub struct PhysicsEngine {
    // Fields drop in declaration order: scene contents first, then the worker
    // pool, then the pipeline, and the diagnostic sink last.
    characters: ResourceTable<CharacterController>,
    meshes: ResourceTable<CookedMesh>,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    islands: IslandManager,
    broad_phase: BroadPhaseMultiSap,
    narrow_phase: NarrowPhase,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,

    workers: rayon::ThreadPool,

    pipeline: PhysicsPipeline,
    integration_params: IntegrationParameters,
    scheduler: FixedStepScheduler,
    gravity: Vector3<f32>,
    config: EngineConfig,

    sink: Box<dyn DiagnosticSink>,
}

/// Report `err` to `sink` and hand it back for returning.
#[track_caller]
fn fail(sink: &dyn DiagnosticSink, err: PhysicsError) -> PhysicsError {
    sink.report(&Diagnostic::new(Severity::Error, err.to_string()));
    err
}

#[track_caller]
fn invalid_handle<T>(
    sink: &dyn DiagnosticSink,
    kind: &'static str,
    handle: Handle<T>,
    len: usize,
) -> PhysicsError {
    fail(
        sink,
        PhysicsError::InvalidHandle {
            kind,
            index: handle.index(),
            len,
        },
    )
}

fn is_finite_vector(v: &Vector3<f32>) -> bool {
    v.iter().all(|c| c.is_finite())
}

impl PhysicsEngine {
    /// Create an engine that reports diagnostics through the `log` facade.
    pub fn initialize(config: EngineConfig) -> Result<Self> {
        Self::initialize_with_sink(config, LogSink)
    }

    /// Create an engine that reports diagnostics to `sink`.
    ///
    /// Fails if the configuration is invalid or the worker pool cannot be
    /// built. The failure is reported to `sink` as well.
    pub fn initialize_with_sink(
        config: EngineConfig,
        sink: impl DiagnosticSink + 'static,
    ) -> Result<Self> {
        if let Err(err) = config.validate() {
            return Err(fail(&sink, err));
        }

        let workers = rayon::ThreadPoolBuilder::new()
            .num_threads(config.thread_count)
            .thread_name(|i| format!("gantry-physics-{}", i))
            .build()
            .map_err(|e| {
                fail(
                    &sink,
                    PhysicsError::Initialization {
                        component: "worker pool",
                        reason: e.to_string(),
                    },
                )
            })?;

        if cfg!(not(feature = "parallel")) && config.thread_count > 1 {
            log::warn!(
                "built without the `parallel` feature: steps run on one of the {} worker threads",
                config.thread_count
            );
        }

        log::info!(
            "physics engine initialized: {} worker threads, gravity {:?}",
            config.thread_count,
            config.gravity
        );

        Ok(Self {
            characters: ResourceTable::new(),
            meshes: ResourceTable::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            islands: IslandManager::new(),
            broad_phase: BroadPhaseMultiSap::new(),
            narrow_phase: NarrowPhase::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            workers,
            pipeline: PhysicsPipeline::new(),
            integration_params: IntegrationParameters::default(),
            scheduler: FixedStepScheduler::new(),
            gravity: config.gravity_vector(),
            config,
            sink: Box::new(sink),
        })
    }

    #[track_caller]
    fn fail(&self, err: PhysicsError) -> PhysicsError {
        fail(self.sink.as_ref(), err)
    }

    /// Advance the scene by `elapsed_seconds`, blocking until the step is done.
    ///
    /// A zero step is a no-op.
    pub fn simulate(&mut self, elapsed_seconds: f32) -> Result<()> {
        if !elapsed_seconds.is_finite() || elapsed_seconds < 0.0 {
            return Err(self.fail(PhysicsError::InvalidTimeStep(elapsed_seconds)));
        }
        if elapsed_seconds == 0.0 {
            return Ok(());
        }

        self.integration_params.dt = elapsed_seconds;

        let Self {
            bodies,
            colliders,
            impulse_joints,
            multibody_joints,
            islands,
            broad_phase,
            narrow_phase,
            ccd_solver,
            query_pipeline,
            workers,
            pipeline,
            integration_params,
            gravity,
            ..
        } = self;

        workers.install(|| {
            pipeline.step(
                gravity,
                integration_params,
                islands,
                broad_phase,
                narrow_phase,
                bodies,
                colliders,
                impulse_joints,
                multibody_joints,
                ccd_solver,
                Some(query_pipeline),
                &(),
                &(),
            );
        });

        Ok(())
    }

    /// Simulate only if `1 / frequency` seconds have passed since the last
    /// accepted step. Returns the elapsed time of the step that ran, if any.
    pub fn simulate_fixed_frequency(&mut self, frequency: f32) -> Result<Option<f32>> {
        self.simulate_fixed_frequency_with(frequency, |_, _| {})
    }

    /// Like [`Self::simulate_fixed_frequency`], calling `callback` with the
    /// elapsed time just before the step runs.
    pub fn simulate_fixed_frequency_with<F>(
        &mut self,
        frequency: f32,
        callback: F,
    ) -> Result<Option<f32>>
    where
        F: FnOnce(&mut Self, f32),
    {
        self.simulate_fixed_frequency_at(frequency, Instant::now(), callback)
    }

    /// Like [`Self::simulate_fixed_frequency_with`], measured at `now`.
    pub fn simulate_fixed_frequency_at<F>(
        &mut self,
        frequency: f32,
        now: Instant,
        callback: F,
    ) -> Result<Option<f32>>
    where
        F: FnOnce(&mut Self, f32),
    {
        if !is_valid_frequency(frequency) {
            return Err(self.fail(PhysicsError::InvalidFrequency(frequency)));
        }

        let Some(elapsed) = self.scheduler.poll_at(frequency, now) else {
            return Ok(None);
        };

        callback(self, elapsed);
        self.simulate(elapsed)?;
        Ok(Some(elapsed))
    }

    /// Cook a triangle mesh and register it. Returns its handle.
    ///
    /// The index count must be a multiple of 3.
    pub fn create_triangle_mesh<V, I>(
        &mut self,
        vertices: &[V],
        indices: &[I],
    ) -> Result<MeshHandle>
    where
        V: VertexPosition,
        I: Copy + Into<u32>,
    {
        let mesh = cook_triangle_mesh(vertices, indices).map_err(|e| self.fail(e))?;
        log::debug!(
            "cooked triangle mesh: {} vertices, {} triangles",
            mesh.vertex_count(),
            mesh.triangle_count()
        );
        Ok(self.meshes.push(mesh))
    }

    /// Place a static instance of a cooked mesh in the scene.
    pub fn create_static_mesh(
        &mut self,
        mesh: MeshHandle,
        position: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
        scale: Vector3<f32>,
    ) -> Result<()> {
        let cooked = self
            .meshes
            .get(mesh)
            .ok_or_else(|| invalid_handle(self.sink.as_ref(), "mesh", mesh, self.meshes.len()))?;

        let rotation_ok = rotation.coords.iter().all(|c| c.is_finite());
        if !is_finite_vector(&position)
            || !rotation_ok
            || !is_finite_vector(&scale)
            || scale.iter().any(|s| *s == 0.0)
        {
            return Err(self.fail(PhysicsError::InvalidMesh(format!(
                "static mesh pose must be finite with non-zero scale \
                 (position {:?}, rotation {:?}, scale {:?})",
                position, rotation, scale
            ))));
        }

        let shape = SharedShape::new(cooked.scaled(&scale));
        let collider = ColliderBuilder::new(shape)
            .position(Isometry3::from_parts(position.into(), rotation))
            .friction(self.config.material.friction)
            .restitution(self.config.material.restitution)
            .build();
        let handle = self.colliders.insert(collider);

        log::debug!("static mesh {} placed at {:?} ({:?})", mesh, position, handle);
        Ok(())
    }

    /// Create a static height-field terrain.
    ///
    /// `samples` is a row-major `width x height` grid of normalized heights;
    /// `0` maps to `min_z` and `1` to `max_z`. The field covers `scale.x`
    /// along X and `scale.z` along Z with its minimum corner at `position`.
    /// Heights are in world units; `scale.y` is not applied.
    #[allow(clippy::too_many_arguments)]
    pub fn create_terrain(
        &mut self,
        position: Vector3<f32>,
        scale: Vector3<f32>,
        width: usize,
        height: usize,
        min_z: f32,
        max_z: f32,
        samples: &[f32],
    ) -> Result<()> {
        let heights =
            terrain_heights(width, height, min_z, max_z, samples).map_err(|e| self.fail(e))?;

        let extent_ok = |v: f32| v.is_finite() && v > 0.0;
        if !is_finite_vector(&position) || !extent_ok(scale.x) || !extent_ok(scale.z) {
            return Err(self.fail(PhysicsError::InvalidTerrain(format!(
                "terrain needs a finite position and positive extents (position {:?}, scale {:?})",
                position, scale
            ))));
        }

        // Parry centers height-fields on their origin.
        let center = position + Vector3::new(scale.x * 0.5, 0.0, scale.z * 0.5);
        let collider = ColliderBuilder::heightfield(heights, Vector3::new(scale.x, 1.0, scale.z))
            .translation(center)
            .friction(self.config.material.friction)
            .restitution(self.config.material.restitution)
            .build();
        let handle = self.colliders.insert(collider);

        log::debug!(
            "terrain {}x{} created at {:?} ({:?})",
            width,
            height,
            position,
            handle
        );
        Ok(())
    }

    /// Create a capsule character controller. Returns its handle.
    ///
    /// `height` is the distance between the hemisphere centers. The contact
    /// offset is `radius * 1.1` and the step offset `height * 0.25`.
    pub fn create_character_controller(
        &mut self,
        start_position: Vector3<f32>,
        height: f32,
        radius: f32,
    ) -> Result<ControllerHandle> {
        let desc = ControllerDesc::capsule(height, radius);
        desc.validate().map_err(|e| self.fail(e))?;
        if !is_finite_vector(&start_position) {
            return Err(self.fail(PhysicsError::InvalidController(format!(
                "start position must be finite, got {:?}",
                start_position
            ))));
        }

        let collider = ColliderBuilder::capsule_y(height * 0.5, radius)
            .translation(start_position)
            .friction(self.config.material.friction)
            .restitution(self.config.material.restitution)
            .build();
        let collider = self.colliders.insert(collider);

        let up = UnitVector3::try_new(-self.gravity, 1.0e-6).unwrap_or_else(Vector3::y_axis);
        let handle = self.characters.push(CharacterController::new(
            desc,
            collider,
            start_position,
            up,
            &self.config.character,
        ));

        log::debug!("character {} created at {:?}", handle, start_position);
        Ok(handle)
    }

    /// Look up a character controller.
    pub fn character(&self, handle: ControllerHandle) -> Result<&CharacterController> {
        self.characters.get(handle).ok_or_else(|| {
            invalid_handle(self.sink.as_ref(), "character", handle, self.characters.len())
        })
    }

    /// Sweep a character by `displacement` (plus gravity when `apply_gravity`)
    /// and resolve collisions. Returns which sides of the capsule were hit.
    ///
    /// Gravity is added once, as a displacement. Moves shorter than
    /// `character.min_move_distance` are skipped.
    pub fn move_character(
        &mut self,
        handle: ControllerHandle,
        displacement: Vector3<f32>,
        elapsed_time: f32,
        apply_gravity: bool,
    ) -> Result<CollisionFlags> {
        let sink = self.sink.as_ref();
        let len = self.characters.len();
        let character = match self.characters.get_mut(handle) {
            Some(character) => character,
            None => return Err(invalid_handle(sink, "character", handle, len)),
        };

        if !elapsed_time.is_finite() || elapsed_time < 0.0 {
            return Err(fail(sink, PhysicsError::InvalidTimeStep(elapsed_time)));
        }
        if !is_finite_vector(&displacement) {
            return Err(fail(
                sink,
                PhysicsError::InvalidController(format!(
                    "displacement must be finite, got {:?}",
                    displacement
                )),
            ));
        }

        let mut desired = displacement;
        if apply_gravity {
            desired += self.gravity;
        }
        if desired.norm() < self.config.character.min_move_distance {
            return Ok(CollisionFlags::empty());
        }

        // Pick up geometry added since the last step.
        self.query_pipeline.update(&self.colliders);

        let collider = self.colliders.get(character.collider).ok_or_else(|| {
            invalid_handle(sink, "character collider", handle, len)
        })?;

        let mut contact_normals = Vec::new();
        let movement = character.controller.move_shape(
            elapsed_time,
            &self.bodies,
            &self.colliders,
            &self.query_pipeline,
            collider.shape(),
            collider.position(),
            desired,
            QueryFilter::default().exclude_collider(character.collider),
            |collision| contact_normals.push(-collision.hit.normal1.into_inner()),
        );
        let translation = collider.position().translation.vector + movement.translation;

        let walkable_cos = self.config.character.max_slope_climb_deg.to_radians().cos();
        let flags = CollisionFlags::from_contacts(
            movement.grounded,
            contact_normals,
            &character.controller.up,
            walkable_cos,
        );

        character.set_position(translation);
        if let Some(collider) = self.colliders.get_mut(character.collider) {
            collider.set_translation(translation);
        }

        Ok(flags)
    }

    /// Gravity applied to the scene and to gravity-affected character moves.
    pub fn gravity(&self) -> Vector3<f32> {
        self.gravity
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of cooked meshes.
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Number of character controllers.
    pub fn character_count(&self) -> usize {
        self.characters.len()
    }

    /// Number of static colliders (meshes and terrain).
    pub fn static_collider_count(&self) -> usize {
        self.colliders.len() - self.characters.len()
    }
}
