#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world geometry for hopgrid levels.
//!
//! A [`World`] is assembled once from a finished layout and then shared
//! read-only by every movement controller. It answers [`SpatialQuery`]
//! requests against three kinds of geometry: the terrain under the grid, one
//! box per obstacle, and the reward object.

use glam::Vec3;
use hopgrid_core::{
    CellCoord, CollisionLayer, GridFrame, LayerMask, OccupancyModel, RewardCell, SpatialQuery,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Height above the probe point from which ground rays start.
const GROUND_PROBE_LIFT: f32 = 5.0;
/// Length of the downward ground ray.
const GROUND_PROBE_DEPTH: f32 = 50.0;

/// Tuning for the colliders derived from a layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Height of each obstacle box in world units.
    pub obstacle_height: f32,
    /// Footprint of the reward box as a fraction of the cell size.
    pub reward_extent: f32,
    /// Height of the reward box in world units.
    pub reward_height: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            obstacle_height: 1.0,
            reward_extent: 0.8,
            reward_height: 0.8,
        }
    }
}

/// Reasons a world cannot be assembled from the provided parts.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WorldError {
    /// The occupancy snapshot was generated for a different grid.
    #[error("occupancy is {occupancy:?} but the grid frame is {frame:?}")]
    DimensionMismatch {
        /// Dimensions of the grid frame.
        frame: (u32, u32),
        /// Dimensions of the occupancy snapshot.
        occupancy: (u32, u32),
    },
}

/// Ground surface under a single cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Ground {
    /// Ground at the frame's configured ground level.
    #[default]
    Flat,
    /// Ground raised or lowered to an absolute height.
    Height(f32),
    /// No ground at all; queries fall through.
    Hole,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Collider {
    layer: CollisionLayer,
    min: Vec3,
    max: Vec3,
}

impl Collider {
    fn covers_column(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    fn overlaps(&self, min: Vec3, max: Vec3) -> bool {
        self.min.x < max.x
            && min.x < self.max.x
            && self.min.y < max.y
            && min.y < self.max.y
            && self.min.z < max.z
            && min.z < self.max.z
    }
}

/// Read-only level geometry shared by every actor.
#[derive(Clone, Debug)]
pub struct World {
    frame: GridFrame,
    occupancy: OccupancyModel,
    reward: Option<RewardCell>,
    config: WorldConfig,
    terrain: Vec<Ground>,
    colliders: Vec<Collider>,
}

impl World {
    /// Assembles the world from a frame and a finished layout.
    pub fn new(
        frame: GridFrame,
        occupancy: OccupancyModel,
        reward: Option<RewardCell>,
        config: WorldConfig,
    ) -> Result<Self, WorldError> {
        let frame_dimensions = (frame.width(), frame.height());
        if occupancy.dimensions() != frame_dimensions {
            return Err(WorldError::DimensionMismatch {
                frame: frame_dimensions,
                occupancy: occupancy.dimensions(),
            });
        }

        let capacity = usize::try_from(u64::from(frame.width()) * u64::from(frame.height()))
            .unwrap_or(0);
        let mut world = Self {
            frame,
            occupancy,
            reward,
            config,
            terrain: vec![Ground::Flat; capacity],
            colliders: Vec::new(),
        };
        world.rebuild_colliders();
        Ok(world)
    }

    /// Reshapes the ground under a cell; obstacles on it follow.
    ///
    /// Cells outside the grid are ignored.
    pub fn set_ground(&mut self, cell: CellCoord, ground: Ground) {
        if let Some(slot) = self.terrain_index(cell).and_then(|index| self.terrain.get_mut(index)) {
            *slot = ground;
            self.rebuild_colliders();
        }
    }

    fn rebuild_colliders(&mut self) {
        let half = self.frame.cell_size() * 0.5;
        let mut colliders: Vec<Collider> = self
            .occupancy
            .occupied_cells()
            .map(|cell| {
                let center = self.frame.cell_center(cell);
                let base = self.terrain_top(cell).unwrap_or(self.frame.ground_level());
                Collider {
                    layer: CollisionLayer::OBSTACLE,
                    min: Vec3::new(center.x - half, base, center.z - half),
                    max: Vec3::new(
                        center.x + half,
                        base + self.config.obstacle_height,
                        center.z + half,
                    ),
                }
            })
            .collect();

        if let Some(reward) = self.reward {
            let cell = reward.center();
            let center = self.frame.cell_center(cell);
            let base = self.terrain_top(cell).unwrap_or(self.frame.ground_level());
            let reach = half * self.config.reward_extent;
            colliders.push(Collider {
                layer: CollisionLayer::REWARD,
                min: Vec3::new(center.x - reach, base, center.z - reach),
                max: Vec3::new(
                    center.x + reach,
                    base + self.config.reward_height,
                    center.z + reach,
                ),
            });
        }

        self.colliders = colliders;
    }

    fn terrain_top(&self, cell: CellCoord) -> Option<f32> {
        let ground = self
            .terrain_index(cell)
            .and_then(|index| self.terrain.get(index).copied())?;
        match ground {
            Ground::Flat => Some(self.frame.ground_level()),
            Ground::Height(height) => Some(height),
            Ground::Hole => None,
        }
    }

    fn terrain_index(&self, cell: CellCoord) -> Option<usize> {
        if !self.frame.contains(cell) {
            return None;
        }
        let row = usize::try_from(cell.row()).ok()?;
        let column = usize::try_from(cell.column()).ok()?;
        let width = usize::try_from(self.frame.width()).ok()?;
        Some(row * width + column)
    }
}

impl SpatialQuery for World {
    fn ground_height(&self, point: Vec3, mask: LayerMask) -> Option<f32> {
        let ray_top = point.y + GROUND_PROBE_LIFT;
        let ray_bottom = ray_top - GROUND_PROBE_DEPTH;
        let in_range = |height: f32| height <= ray_top && height >= ray_bottom;

        let terrain = if mask.contains(CollisionLayer::GROUND) {
            let cell = self.frame.world_to_cell(point);
            self.terrain_top(cell).filter(|height| in_range(*height))
        } else {
            None
        };

        self.colliders
            .iter()
            .filter(|collider| mask.contains(collider.layer) && collider.covers_column(point))
            .map(|collider| collider.max.y)
            .filter(|height| in_range(*height))
            .chain(terrain)
            .reduce(f32::max)
    }

    fn overlaps_box(&self, center: Vec3, half_extents: Vec3, mask: LayerMask) -> bool {
        let min = center - half_extents;
        let max = center + half_extents;
        self.colliders
            .iter()
            .any(|collider| mask.contains(collider.layer) && collider.overlaps(min, max))
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use hopgrid_core::{CellCoord, GridFrame, OccupancyModel, RewardCell};

    use super::World;

    /// Provides read-only access to the world's grid frame.
    #[must_use]
    pub fn frame(world: &World) -> &GridFrame {
        &world.frame
    }

    /// Provides read-only access to the generated occupancy snapshot.
    #[must_use]
    pub fn occupancy(world: &World) -> &OccupancyModel {
        &world.occupancy
    }

    /// Reward placed in the level, if the grid had room for one.
    #[must_use]
    pub fn reward(world: &World) -> Option<RewardCell> {
        world.reward
    }

    /// Reports whether the cell is inside the grid and free of obstacles.
    #[must_use]
    pub fn is_open(world: &World, cell: CellCoord) -> bool {
        world.frame.contains(cell)
            && !world.occupancy.is_occupied(cell)
            && world.reward.map_or(true, |reward| reward.center() != cell)
    }
}
