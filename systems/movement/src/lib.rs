#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Tick-driven grid movement for a single actor.
//!
//! A [`MovementController`] owns one actor's committed cell and facing. A
//! step request is validated once, up front, against the grid bounds and a
//! box probe over the target cell; once accepted the transition runs to
//! completion over `transition_duration` and is never re-validated. The
//! authoritative root slides linearly on the ground plane at the starting
//! height while an optional hop is applied to the visual pose only, so
//! anything tracking the root never sees vertical jitter.

use std::{f32::consts::PI, time::Duration};

use glam::{EulerRot, Quat, Vec3};
use hopgrid_core::{
    CellCoord, CollisionLayer, Direction, GridFrame, InputSource, LayerMask, SpatialQuery,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

/// Tuning for a movement controller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Rejects steps that would leave `[0, width) × [0, height)`.
    pub clamp_to_bounds: bool,
    /// Fraction of a cell covered horizontally by the blocking probe.
    pub cell_occupancy: f32,
    /// Height of the blocking probe above the target ground.
    pub probe_height: f32,
    /// Time needed to travel one cell.
    #[serde(with = "seconds", rename = "transition_secs")]
    pub transition_duration: Duration,
    /// Peak height of the visual hop.
    pub hop_height: f32,
    /// Applies the hop to the visual pose; without it the visual never bobs.
    pub bob_visual_only: bool,
    /// Resting offset of the visual relative to the root.
    pub model_offset: Vec3,
    /// Pitch, yaw and roll in degrees applied beneath the facing yaw.
    pub fix_pitch_roll: Vec3,
    /// Layers that block a step.
    pub obstacle_mask: LayerMask,
    /// Layers considered ground.
    pub ground_mask: LayerMask,
    /// Layer the actor itself lives on; excluded from every query.
    pub layer: CollisionLayer,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            clamp_to_bounds: true,
            cell_occupancy: 0.9,
            probe_height: 2.0,
            transition_duration: Duration::from_millis(220),
            hop_height: 0.35,
            bob_visual_only: true,
            model_offset: Vec3::ZERO,
            fix_pitch_roll: Vec3::ZERO,
            obstacle_mask: LayerMask::of(CollisionLayer::OBSTACLE).with(CollisionLayer::REWARD),
            ground_mask: LayerMask::of(CollisionLayer::GROUND),
            layer: CollisionLayer::ACTOR,
        }
    }
}

mod seconds {
    use std::time::Duration;

    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

/// Reasons a [`MovementConfig`] is rejected.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum MovementError {
    /// Transitions must take some time.
    #[error("transition duration must be positive")]
    ZeroDuration,
    /// The probe must cover between 10% and 100% of a cell.
    #[error("cell occupancy must lie in [0.1, 1], got {cell_occupancy}")]
    OccupancyOutOfRange {
        /// Provided fraction.
        cell_occupancy: f32,
    },
    /// The probe needs a positive, finite height.
    #[error("probe height must be finite and positive, got {probe_height}")]
    InvalidProbeHeight {
        /// Provided height.
        probe_height: f32,
    },
    /// The hop cannot be negative.
    #[error("hop height must be finite and non-negative, got {hop_height}")]
    InvalidHopHeight {
        /// Provided height.
        hop_height: f32,
    },
}

/// In-flight move between two adjacent cells.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transition {
    /// Committed cell the actor is leaving.
    pub from: CellCoord,
    /// Cell the actor commits to on arrival.
    pub to: CellCoord,
    /// Time accumulated since the step started.
    pub elapsed: Duration,
    /// Grounded world position of `from` when the step started.
    pub from_world: Vec3,
    /// World position of `to` when the step started.
    pub to_world: Vec3,
}

/// Whether the actor is resting or stepping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MotionPhase {
    /// Resting on the committed cell.
    Idle,
    /// Moving toward an adjacent cell.
    Transitioning(Transition),
}

/// Authoritative state of one actor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActorState {
    /// Committed cell; during a transition this is still the starting cell.
    pub cell: CellCoord,
    /// Direction of the last accepted step.
    pub facing: Direction,
    /// Current motion phase.
    pub phase: MotionPhase,
}

/// Pose of the actor's visual relative to its root.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisualPose {
    /// Local offset, including the hop while stepping.
    pub offset: Vec3,
    /// Local rotation combining facing yaw and the fixed pitch/roll.
    pub rotation: Quat,
}

/// Result of a single step request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step was accepted and a transition started.
    Started {
        /// Cell being left.
        from: CellCoord,
        /// Cell being entered.
        to: CellCoord,
    },
    /// A transition is already running; the request was dropped.
    InFlight,
    /// The target cell lies outside the grid.
    OutOfBounds,
    /// Something in the obstacle mask occupies the target cell.
    Blocked,
}

/// What happened during one simulation tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickOutcome {
    /// Idle with nothing requested.
    Idle,
    /// Idle and a step was requested.
    Step(StepOutcome),
    /// Still transitioning.
    Moving {
        /// Normalised progress `k` in `[0, 1)`.
        progress: f32,
    },
    /// The transition finished and the cell was committed.
    Arrived {
        /// Newly committed cell.
        cell: CellCoord,
    },
}

/// Step/transition state machine for one actor.
#[derive(Clone, Debug)]
pub struct MovementController {
    config: MovementConfig,
    frame: GridFrame,
    state: ActorState,
    position: Vec3,
    visual: VisualPose,
    base_rotation: Quat,
}

impl MovementController {
    /// Spawns an idle actor on `cell`, facing north, resting on the ground.
    ///
    /// The spawn cell is not validated against bounds or obstacles.
    pub fn new<S>(
        config: MovementConfig,
        frame: GridFrame,
        cell: CellCoord,
        space: &S,
    ) -> Result<Self, MovementError>
    where
        S: SpatialQuery + ?Sized,
    {
        validate(&config)?;

        let fix = config.fix_pitch_roll;
        let base_rotation = Quat::from_euler(
            EulerRot::YXZ,
            fix.y.to_radians(),
            fix.x.to_radians(),
            fix.z.to_radians(),
        );
        let mut controller = Self {
            visual: VisualPose {
                offset: config.model_offset,
                rotation: base_rotation,
            },
            state: ActorState {
                cell,
                facing: Direction::North,
                phase: MotionPhase::Idle,
            },
            position: Vec3::ZERO,
            base_rotation,
            config,
            frame,
        };
        controller.face(Direction::North);
        controller.position = controller.grounded(cell, space);
        Ok(controller)
    }

    /// Spawns an actor on the cell nearest to a world position.
    pub fn spawn_at<S>(
        config: MovementConfig,
        frame: GridFrame,
        position: Vec3,
        space: &S,
    ) -> Result<Self, MovementError>
    where
        S: SpatialQuery + ?Sized,
    {
        let cell = frame.world_to_cell(position);
        Self::new(config, frame, cell, space)
    }

    /// Authoritative actor state.
    #[must_use]
    pub const fn state(&self) -> &ActorState {
        &self.state
    }

    /// Committed cell.
    #[must_use]
    pub const fn cell(&self) -> CellCoord {
        self.state.cell
    }

    /// Direction of the last accepted step.
    #[must_use]
    pub const fn facing(&self) -> Direction {
        self.state.facing
    }

    /// World position of the root.
    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.position
    }

    /// Pose of the visual relative to the root.
    #[must_use]
    pub const fn visual(&self) -> VisualPose {
        self.visual
    }

    /// Reports whether a transition is in flight.
    #[must_use]
    pub const fn is_moving(&self) -> bool {
        matches!(self.state.phase, MotionPhase::Transitioning(_))
    }

    /// Requests a single step; rejected requests change nothing.
    pub fn try_move<S>(&mut self, direction: Direction, space: &S) -> StepOutcome
    where
        S: SpatialQuery + ?Sized,
    {
        if self.is_moving() {
            trace!(?direction, "step ignored while transitioning");
            return StepOutcome::InFlight;
        }

        let from = self.state.cell;
        let to = from.step(direction);
        if self.config.clamp_to_bounds && !self.frame.contains(to) {
            trace!(?from, ?to, "step rejected: out of bounds");
            return StepOutcome::OutOfBounds;
        }

        let to_world = self.grounded(to, space);
        if self.is_blocked(to_world, space) {
            trace!(?from, ?to, "step rejected: target blocked");
            return StepOutcome::Blocked;
        }

        self.face(direction);
        self.state.phase = MotionPhase::Transitioning(Transition {
            from,
            to,
            elapsed: Duration::ZERO,
            from_world: self.grounded(from, space),
            to_world,
        });
        debug!(?from, ?to, ?direction, "step started");
        StepOutcome::Started { from, to }
    }

    /// Advances an in-flight transition by `dt`.
    ///
    /// Returns the committed cell on the tick the transition completes.
    pub fn advance<S>(&mut self, dt: Duration, space: &S) -> Option<CellCoord>
    where
        S: SpatialQuery + ?Sized,
    {
        let MotionPhase::Transitioning(transition) = &mut self.state.phase else {
            return None;
        };
        transition.elapsed = transition.elapsed.saturating_add(dt);
        let transition = *transition;

        if transition.elapsed >= self.config.transition_duration {
            let mut landed = transition.to_world;
            landed.y = space
                .ground_height(landed, self.ground_filter())
                .unwrap_or(self.frame.ground_level());
            self.position = landed;
            self.visual.offset = self.config.model_offset;
            self.state.cell = transition.to;
            self.state.phase = MotionPhase::Idle;
            debug!(cell = ?transition.to, "step committed");
            return Some(transition.to);
        }

        let k = self.progress_of(&transition);
        let mut root = transition.from_world.lerp(transition.to_world, k);
        root.y = transition.from_world.y;
        self.position = root;
        self.visual.offset = self.config.model_offset + Vec3::Y * self.hop(k);
        None
    }

    /// Runs one simulation tick with at most one directional intent.
    ///
    /// While transitioning the intent is discarded and the transition
    /// advances. While idle the visual is re-pinned to its resting offset and
    /// a present intent becomes a step request; the tick that starts a step
    /// does not advance it.
    pub fn tick<S>(&mut self, dt: Duration, intent: Option<Direction>, space: &S) -> TickOutcome
    where
        S: SpatialQuery + ?Sized,
    {
        if let MotionPhase::Transitioning(_) = self.state.phase {
            return match self.advance(dt, space) {
                Some(cell) => TickOutcome::Arrived { cell },
                None => TickOutcome::Moving {
                    progress: self.progress().unwrap_or(0.0),
                },
            };
        }

        if self.config.bob_visual_only {
            self.visual.offset = self.config.model_offset;
        }

        match intent {
            Some(direction) => TickOutcome::Step(self.try_move(direction, space)),
            None => TickOutcome::Idle,
        }
    }

    /// Polls the input source once and runs a tick with its intent.
    pub fn drive<I, S>(&mut self, dt: Duration, input: &mut I, space: &S) -> TickOutcome
    where
        I: InputSource + ?Sized,
        S: SpatialQuery + ?Sized,
    {
        let intent = input.poll();
        self.tick(dt, intent, space)
    }

    /// Normalised progress of the running transition.
    #[must_use]
    pub fn progress(&self) -> Option<f32> {
        match &self.state.phase {
            MotionPhase::Idle => None,
            MotionPhase::Transitioning(transition) => Some(self.progress_of(transition)),
        }
    }

    /// Places the actor on `cell` immediately, abandoning any transition.
    ///
    /// Bounds and obstacles are not checked.
    pub fn teleport<S>(&mut self, cell: CellCoord, space: &S)
    where
        S: SpatialQuery + ?Sized,
    {
        self.state.cell = cell;
        self.state.phase = MotionPhase::Idle;
        self.position = self.grounded(cell, space);
        self.visual.offset = self.config.model_offset;
        debug!(?cell, "actor teleported");
    }

    fn face(&mut self, direction: Direction) {
        self.state.facing = direction;
        self.visual.rotation = Quat::from_rotation_y(direction.yaw()) * self.base_rotation;
    }

    fn grounded<S>(&self, cell: CellCoord, space: &S) -> Vec3
    where
        S: SpatialQuery + ?Sized,
    {
        self.frame.cell_to_world(cell, space, self.ground_filter())
    }

    fn is_blocked<S>(&self, target: Vec3, space: &S) -> bool
    where
        S: SpatialQuery + ?Sized,
    {
        let half = self.frame.cell_size() * self.config.cell_occupancy * 0.5;
        let half_extents = Vec3::new(half, self.config.probe_height * 0.5, half);
        let center = target + Vec3::Y * half_extents.y;
        space.overlaps_box(center, half_extents, self.obstacle_filter())
    }

    fn progress_of(&self, transition: &Transition) -> f32 {
        let duration = self.config.transition_duration.as_secs_f32();
        (transition.elapsed.as_secs_f32() / duration).clamp(0.0, 1.0)
    }

    fn hop(&self, k: f32) -> f32 {
        if self.config.bob_visual_only {
            (k * PI).sin() * self.config.hop_height
        } else {
            0.0
        }
    }

    fn ground_filter(&self) -> LayerMask {
        self.config.ground_mask.without(self.config.layer)
    }

    fn obstacle_filter(&self) -> LayerMask {
        self.config.obstacle_mask.without(self.config.layer)
    }
}

fn validate(config: &MovementConfig) -> Result<(), MovementError> {
    if config.transition_duration.is_zero() {
        return Err(MovementError::ZeroDuration);
    }
    if !(0.1..=1.0).contains(&config.cell_occupancy) {
        return Err(MovementError::OccupancyOutOfRange {
            cell_occupancy: config.cell_occupancy,
        });
    }
    if !config.probe_height.is_finite() || config.probe_height <= 0.0 {
        return Err(MovementError::InvalidProbeHeight {
            probe_height: config.probe_height,
        });
    }
    if !config.hop_height.is_finite() || config.hop_height < 0.0 {
        return Err(MovementError::InvalidHopHeight {
            hop_height: config.hop_height,
        });
    }
    Ok(())
}
