#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Procedural level layout generation.
//!
//! The generator walks every anchor where an obstacle cluster fits, keeps a
//! random subset of them that respect a separation margin, a spawn-safe zone
//! and a reserved reward block, and fills each kept cluster with a random
//! number of obstacle cells. The result is a frozen [`OccupancyModel`] plus
//! the reward location, which [`Layout::instantiate`] turns into visual
//! instances.

use std::f32::consts::FRAC_PI_2;

use glam::{Quat, Vec3};
use hopgrid_core::{
    CellCoord, CellRect, CellRectSize, GridFrame, Instantiator, OccupancyGrid, OccupancyModel,
    PlacementKind, RewardCell, REWARD_BLOCK_SIZE,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Tuning knobs for a generation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Corner rectangle kept free of obstacles so the actor can spawn.
    pub spawn_safe: CellRectSize,
    /// Side length of a square obstacle cluster.
    pub cluster_size: u32,
    /// Probability that a candidate anchor is considered at all.
    pub spawn_chance: f32,
    /// Lower bound of obstacle cells drawn per accepted cluster.
    pub min_fill: u32,
    /// Upper bound of obstacle cells drawn per accepted cluster.
    pub max_fill: u32,
    /// Minimum gap, in cells, kept around every accepted cluster.
    pub separation: u32,
    /// Number of interchangeable obstacle visuals to choose from.
    pub obstacle_variants: u32,
    /// Vertical offset applied to every placed instance.
    pub prop_lift: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            spawn_safe: CellRectSize::new(2, 2),
            cluster_size: 3,
            spawn_chance: 0.8,
            min_fill: 3,
            max_fill: 9,
            separation: 1,
            obstacle_variants: 1,
            prop_lift: 0.05,
        }
    }
}

/// Reasons a [`LayoutConfig`] is rejected.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum LayoutError {
    /// Clusters must cover at least one cell.
    #[error("cluster size must be positive")]
    EmptyCluster,
    /// The anchor probability must lie in `[0, 1]`.
    #[error("spawn chance must lie in [0, 1], got {spawn_chance}")]
    SpawnChanceOutOfRange {
        /// Provided probability.
        spawn_chance: f32,
    },
    /// The fill range is inverted.
    #[error("minimum fill {min_fill} exceeds maximum fill {max_fill}")]
    InvertedFillRange {
        /// Provided lower bound.
        min_fill: u32,
        /// Provided upper bound.
        max_fill: u32,
    },
}

/// Square cluster footprint anchored at its lowest cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlacementRegion {
    anchor: CellCoord,
    size: u32,
}

impl PlacementRegion {
    /// Creates a region of `size × size` cells anchored at `anchor`.
    #[must_use]
    pub const fn new(anchor: CellCoord, size: u32) -> Self {
        Self { anchor, size }
    }

    /// Lowest cell of the cluster.
    #[must_use]
    pub const fn anchor(&self) -> CellCoord {
        self.anchor
    }

    /// Cells covered by the cluster itself.
    #[must_use]
    pub const fn footprint(&self) -> CellRect {
        CellRect::square(self.anchor, self.size)
    }

    /// Footprint grown by the separation margin on every side.
    #[must_use]
    pub fn with_margin(&self, margin: u32) -> CellRect {
        self.footprint().expanded(margin)
    }
}

/// Record of a cluster the generator kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcceptedCluster {
    /// Footprint of the cluster.
    pub region: PlacementRegion,
    /// Margin-expanded rectangle marked blocked, clipped to the grid.
    pub reserved: CellRect,
    /// Number of obstacle cells placed inside the footprint.
    pub filled: u32,
}

/// Finished output of a generation run.
#[derive(Clone, Debug)]
pub struct Layout {
    occupancy: OccupancyModel,
    reward: Option<RewardCell>,
    spawn_safe: Option<CellRect>,
    clusters: Vec<AcceptedCluster>,
    obstacle_variants: u32,
    prop_lift: f32,
}

impl Layout {
    /// Frozen occupancy snapshot.
    #[must_use]
    pub fn occupancy(&self) -> &OccupancyModel {
        &self.occupancy
    }

    /// Reserved reward location, absent when the grid had no room for it.
    #[must_use]
    pub const fn reward(&self) -> Option<RewardCell> {
        self.reward
    }

    /// Spawn-safe rectangle clipped to the grid.
    #[must_use]
    pub const fn spawn_safe(&self) -> Option<CellRect> {
        self.spawn_safe
    }

    /// Clusters accepted in iteration order.
    #[must_use]
    pub fn clusters(&self) -> &[AcceptedCluster] {
        &self.clusters
    }

    /// Hands the occupancy snapshot and reward over to the world.
    #[must_use]
    pub fn into_parts(self) -> (OccupancyModel, Option<RewardCell>) {
        (self.occupancy, self.reward)
    }

    /// Emits one instance per occupied cell and one for the reward.
    ///
    /// Previously placed instances are cleared first. Obstacles get a random
    /// variant and a random quarter-turn around the vertical axis; without
    /// any variants only the reward is placed.
    pub fn instantiate<R, I>(&self, frame: &GridFrame, rng: &mut R, out: &mut I)
    where
        R: Rng + ?Sized,
        I: Instantiator + ?Sized,
    {
        out.clear_all();

        if self.obstacle_variants > 0 {
            for cell in self.occupancy.occupied_cells() {
                let variant = rng.gen_range(0..self.obstacle_variants);
                let quarter_turns = rng.gen_range(0..4u8);
                out.place(
                    PlacementKind::Obstacle { variant },
                    self.prop_position(frame, cell),
                    Quat::from_rotation_y(FRAC_PI_2 * f32::from(quarter_turns)),
                );
            }
        }

        if let Some(reward) = self.reward {
            out.place(
                PlacementKind::Reward,
                self.prop_position(frame, reward.center()),
                Quat::IDENTITY,
            );
        }
    }

    fn prop_position(&self, frame: &GridFrame, cell: CellCoord) -> Vec3 {
        let origin = frame.origin();
        let cell_size = frame.cell_size();
        origin
            + Vec3::new(
                (cell.column() as f32 + 0.5) * cell_size,
                self.prop_lift,
                (cell.row() as f32 + 0.5) * cell_size,
            )
    }
}

/// Constrained obstacle placement over a grid.
#[derive(Clone, Debug)]
pub struct LayoutGenerator {
    config: LayoutConfig,
}

impl LayoutGenerator {
    /// Validates the configuration and builds the generator.
    pub fn new(config: LayoutConfig) -> Result<Self, LayoutError> {
        if config.cluster_size == 0 {
            return Err(LayoutError::EmptyCluster);
        }
        if !(0.0..=1.0).contains(&config.spawn_chance) {
            return Err(LayoutError::SpawnChanceOutOfRange {
                spawn_chance: config.spawn_chance,
            });
        }
        if config.min_fill > config.max_fill {
            return Err(LayoutError::InvertedFillRange {
                min_fill: config.min_fill,
                max_fill: config.max_fill,
            });
        }
        Ok(Self { config })
    }

    /// Runs one complete generation pass over the frame.
    pub fn generate<R>(&self, frame: &GridFrame, rng: &mut R) -> Layout
    where
        R: Rng + ?Sized,
    {
        let columns = frame.width();
        let rows = frame.height();
        let mut grid = OccupancyGrid::new(columns, rows);

        let spawn_safe =
            CellRect::from_origin_and_size(CellCoord::new(0, 0), self.config.spawn_safe)
                .clipped(columns, rows);
        if let Some(region) = spawn_safe {
            grid.block_region(region);
        }

        let reward = reserve_reward(&mut grid, columns, rows, rng);
        let clusters = self.place_clusters(&mut grid, columns, rows, rng);
        let occupancy = grid.freeze();

        debug!(
            columns,
            rows,
            clusters = clusters.len(),
            occupied = occupancy.occupied_count(),
            reward = ?reward.map(|reward| reward.center()),
            "layout generated"
        );

        Layout {
            occupancy,
            reward,
            spawn_safe,
            clusters,
            obstacle_variants: self.config.obstacle_variants,
            prop_lift: self.config.prop_lift,
        }
    }

    fn place_clusters<R>(
        &self,
        grid: &mut OccupancyGrid,
        columns: u32,
        rows: u32,
        rng: &mut R,
    ) -> Vec<AcceptedCluster>
    where
        R: Rng + ?Sized,
    {
        let size = self.config.cluster_size;
        let mut accepted = Vec::new();
        if size > columns || size > rows {
            return accepted;
        }

        let capacity = size.saturating_mul(size);
        let (Ok(last_column), Ok(last_row)) =
            (i32::try_from(columns - size), i32::try_from(rows - size))
        else {
            return accepted;
        };

        for ax in 0..=last_column {
            for ay in 0..=last_row {
                if rng.gen::<f32>() > self.config.spawn_chance {
                    continue;
                }

                let region = PlacementRegion::new(CellCoord::new(ax, ay), size);
                let reserved = region.with_margin(self.config.separation);
                if grid.region_has_blocked(reserved) {
                    continue;
                }

                let need = rng
                    .gen_range(self.config.min_fill..=self.config.max_fill)
                    .min(capacity);
                let mut cells: Vec<CellCoord> = region.footprint().cells().collect();
                shuffle(&mut cells, rng);
                for cell in cells.iter().take(usize::try_from(need).unwrap_or(usize::MAX)) {
                    grid.set_occupied(*cell, true);
                }

                grid.block_region(reserved);
                if let Some(reserved) = reserved.clipped(columns, rows) {
                    accepted.push(AcceptedCluster {
                        region,
                        reserved,
                        filled: need,
                    });
                }
            }
        }

        accepted
    }
}

fn reserve_reward<R>(
    grid: &mut OccupancyGrid,
    columns: u32,
    rows: u32,
    rng: &mut R,
) -> Option<RewardCell>
where
    R: Rng + ?Sized,
{
    if columns < REWARD_BLOCK_SIZE || rows < REWARD_BLOCK_SIZE {
        warn!(
            columns,
            rows, "grid too small for the reward block; skipping reward placement"
        );
        return None;
    }

    // Center row is the second from the top; the column keeps the block inside the grid.
    let row = i32::try_from(rows - 2).ok()?;
    let last_column = i32::try_from(columns - 2).ok()?;
    let reward = RewardCell::at(CellCoord::new(rng.gen_range(1..=last_column), row));

    for cell in reward.region().cells() {
        grid.set_blocked(cell, true);
        grid.set_occupied(cell, false);
    }

    Some(reward)
}

fn shuffle<T, R>(items: &mut [T], rng: &mut R)
where
    R: Rng + ?Sized,
{
    for index in (1..items.len()).rev() {
        let swap_index = rng.gen_range(0..=index);
        items.swap(index, swap_index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut items: Vec<u32> = (0..9).collect();
        shuffle(&mut items, &mut rng);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..9).collect::<Vec<_>>());
    }

    #[test]
    fn shuffle_reaches_every_position() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut seen_first = [false; 4];
        for _ in 0..200 {
            let mut items = [0usize, 1, 2, 3];
            shuffle(&mut items, &mut rng);
            seen_first[items[0]] = true;
        }
        assert!(seen_first.iter().all(|seen| *seen));
    }

    #[test]
    fn reward_sits_on_second_row_from_top() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..50 {
            let mut grid = OccupancyGrid::new(8, 6);
            grid.set_occupied(CellCoord::new(3, 4), true);
            let reward = reserve_reward(&mut grid, 8, 6, &mut rng).expect("room for reward");

            assert_eq!(reward.center().row(), 4);
            assert!((1..=6).contains(&reward.center().column()));
            for cell in reward.region().cells() {
                assert!(grid.is_blocked(cell));
                assert!(!grid.is_occupied(cell));
            }
        }
    }

    #[test]
    fn reward_skipped_on_narrow_or_short_grids() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut short = OccupancyGrid::new(10, 2);
        assert_eq!(reserve_reward(&mut short, 10, 2, &mut rng), None);
        let mut narrow = OccupancyGrid::new(2, 10);
        assert_eq!(reserve_reward(&mut narrow, 2, 10, &mut rng), None);
    }

    #[test]
    fn margin_expands_footprint_on_all_sides() {
        let region = PlacementRegion::new(CellCoord::new(4, 5), 3);
        let reserved = region.with_margin(2);
        assert_eq!(reserved.origin(), CellCoord::new(2, 3));
        assert_eq!(reserved.size(), CellRectSize::new(7, 7));
        assert_eq!(region.anchor(), CellCoord::new(4, 5));
    }
}
