#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Assembles a playable level: grid frame, generated layout, emitted
//! placements and the world geometry actors move through.

use hopgrid_core::{
    CellCoord, FrameError, GridFrame, GridFrameConfig, Instantiator, OccupancyModel, RewardCell,
};
use hopgrid_system_layout::{LayoutConfig, LayoutError, LayoutGenerator};
use hopgrid_system_movement::{MovementConfig, MovementController, MovementError};
use hopgrid_world::{query, World, WorldConfig, WorldError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Configuration needed to build a level.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    /// Grid dimensions and world placement.
    pub grid: GridFrameConfig,
    /// Obstacle layout tuning.
    pub layout: LayoutConfig,
    /// Collider tuning.
    pub world: WorldConfig,
}

/// Failures while assembling a level or spawning into it.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The grid configuration is invalid.
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// The layout configuration is invalid.
    #[error(transparent)]
    Layout(#[from] LayoutError),
    /// The world could not be built from the layout.
    #[error(transparent)]
    World(#[from] WorldError),
    /// The movement configuration is invalid.
    #[error(transparent)]
    Movement(#[from] MovementError),
}

/// Validated level builder.
#[derive(Clone, Debug)]
pub struct Bootstrap {
    frame: GridFrame,
    generator: LayoutGenerator,
    world: WorldConfig,
}

impl Bootstrap {
    /// Validates every part of the configuration up front.
    pub fn new(config: &LevelConfig) -> Result<Self, BootstrapError> {
        Ok(Self {
            frame: GridFrame::new(&config.grid)?,
            generator: LayoutGenerator::new(config.layout.clone())?,
            world: config.world.clone(),
        })
    }

    /// Grid frame every level built here shares.
    #[must_use]
    pub const fn frame(&self) -> &GridFrame {
        &self.frame
    }

    /// Generates a layout, emits its placements into `out` and builds the world.
    ///
    /// Generation and instantiation draw from the same random stream, so one
    /// seed reproduces both the layout and the visual choices.
    pub fn build<R, I>(&self, rng: &mut R, out: &mut I) -> Result<Level, BootstrapError>
    where
        R: Rng + ?Sized,
        I: Instantiator + ?Sized,
    {
        let layout = self.generator.generate(&self.frame, rng);
        layout.instantiate(&self.frame, rng, out);

        let spawn = layout
            .spawn_safe()
            .map_or(CellCoord::new(0, 0), |zone| zone.origin());
        let clusters = layout.clusters().len();
        let (occupancy, reward) = layout.into_parts();
        let world = World::new(self.frame, occupancy, reward, self.world.clone())?;

        info!(
            width = self.frame.width(),
            height = self.frame.height(),
            clusters,
            reward = ?reward.map(|cell| cell.center()),
            "level built"
        );
        Ok(Level {
            world,
            spawn,
            clusters,
        })
    }
}

/// A generated level ready for actors.
#[derive(Clone, Debug)]
pub struct Level {
    world: World,
    spawn: CellCoord,
    clusters: usize,
}

impl Level {
    /// World geometry of the level.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Cell actors spawn on; the first cell of the spawn-safe zone.
    #[must_use]
    pub const fn spawn(&self) -> CellCoord {
        self.spawn
    }

    /// Number of obstacle clusters that were accepted.
    #[must_use]
    pub const fn clusters(&self) -> usize {
        self.clusters
    }

    /// Generated occupancy snapshot.
    #[must_use]
    pub fn occupancy(&self) -> &OccupancyModel {
        query::occupancy(&self.world)
    }

    /// Reserved reward, when the grid had room for one.
    #[must_use]
    pub fn reward(&self) -> Option<RewardCell> {
        query::reward(&self.world)
    }

    /// Spawns an idle actor on the spawn cell.
    pub fn spawn_actor(&self, config: MovementConfig) -> Result<MovementController, BootstrapError> {
        let frame = *query::frame(&self.world);
        Ok(MovementController::new(config, frame, self.spawn, &self.world)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};
    use hopgrid_core::PlacementKind;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[derive(Default)]
    struct CountingInstantiator {
        placed: usize,
    }

    impl Instantiator for CountingInstantiator {
        fn place(&mut self, _kind: PlacementKind, _position: Vec3, _rotation: Quat) {
            self.placed += 1;
        }

        fn clear_all(&mut self) {
            self.placed = 0;
        }
    }

    #[test]
    fn invalid_parts_are_reported() {
        let mut config = LevelConfig::default();
        config.grid.width = 0;
        assert!(matches!(
            Bootstrap::new(&config),
            Err(BootstrapError::Frame(_))
        ));

        let mut config = LevelConfig::default();
        config.layout.cluster_size = 0;
        assert!(matches!(
            Bootstrap::new(&config),
            Err(BootstrapError::Layout(LayoutError::EmptyCluster))
        ));
    }

    #[test]
    fn build_emits_one_placement_per_obstacle_plus_reward() {
        let bootstrap = Bootstrap::new(&LevelConfig::default()).expect("default config is valid");
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut out = CountingInstantiator::default();

        let level = bootstrap.build(&mut rng, &mut out).expect("level builds");

        assert_eq!(level.spawn(), CellCoord::new(0, 0));
        assert!(level.reward().is_some());
        assert_eq!(out.placed, level.occupancy().occupied_count() + 1);
    }
}
