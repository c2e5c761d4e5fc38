#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared rendering contracts for hopgrid adapters.

use std::{fmt, io::Write};

use anyhow::{Context, Result as AnyResult};
use glam::{Quat, Vec3};
use hopgrid_core::{CellCoord, Direction, Instantiator, PlacementKind};
use hopgrid_world::{query, World};

/// Glyph for a free cell.
pub const EMPTY_GLYPH: char = '.';
/// Glyph for an obstacle.
pub const OBSTACLE_GLYPH: char = '#';
/// Glyph for the reward itself.
pub const REWARD_GLYPH: char = 'R';
/// Glyph for the cleared cells around the reward.
pub const REWARD_ZONE_GLYPH: char = '+';
/// Glyph for the actor.
pub const ACTOR_GLYPH: char = '@';

/// One visual instance emitted by the layout.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// What was placed.
    pub kind: PlacementKind,
    /// World position of the instance.
    pub position: Vec3,
    /// Rotation of the instance.
    pub rotation: Quat,
}

/// Instantiator that keeps every placement in memory.
#[derive(Clone, Debug, Default)]
pub struct SceneRecorder {
    placements: Vec<Placement>,
    clears: usize,
}

impl SceneRecorder {
    /// Placements emitted since the last clear, in emission order.
    #[must_use]
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Number of times the scene was cleared.
    #[must_use]
    pub const fn clears(&self) -> usize {
        self.clears
    }

    /// Number of obstacle instances currently placed.
    #[must_use]
    pub fn obstacle_count(&self) -> usize {
        self.placements
            .iter()
            .filter(|placement| matches!(placement.kind, PlacementKind::Obstacle { .. }))
            .count()
    }
}

impl Instantiator for SceneRecorder {
    fn place(&mut self, kind: PlacementKind, position: Vec3, rotation: Quat) {
        self.placements.push(Placement {
            kind,
            position,
            rotation,
        });
    }

    fn clear_all(&mut self) {
        self.placements.clear();
        self.clears += 1;
    }
}

/// Top-down character map of a world, north up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapView {
    width: u32,
    height: u32,
    rows: Vec<String>,
}

impl MapView {
    /// Captures the world, drawing the actor on `actor` when it is on the grid.
    #[must_use]
    pub fn capture(world: &World, actor: Option<CellCoord>) -> Self {
        let frame = query::frame(world);
        let occupancy = query::occupancy(world);
        let reward = query::reward(world);
        let (width, height) = (frame.width(), frame.height());

        let rows = (0..height)
            .rev()
            .map(|row| {
                (0..width)
                    .map(|column| {
                        let cell = CellCoord::new(column as i32, row as i32);
                        if actor == Some(cell) {
                            ACTOR_GLYPH
                        } else if occupancy.is_occupied(cell) {
                            OBSTACLE_GLYPH
                        } else if reward.is_some_and(|reward| reward.center() == cell) {
                            REWARD_GLYPH
                        } else if reward.is_some_and(|reward| reward.region().contains(cell)) {
                            REWARD_ZONE_GLYPH
                        } else {
                            EMPTY_GLYPH
                        }
                    })
                    .collect()
            })
            .collect();

        Self {
            width,
            height,
            rows,
        }
    }

    /// Number of columns in the map.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows in the map.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Rows from north to south.
    #[must_use]
    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    /// Glyph at a cell, if the cell is on the map.
    #[must_use]
    pub fn glyph(&self, cell: CellCoord) -> Option<char> {
        let column = usize::try_from(cell.column()).ok()?;
        let row = u32::try_from(cell.row()).ok()?;
        let line = self.height.checked_sub(row + 1)?;
        self.rows.get(line as usize)?.chars().nth(column)
    }
}

impl fmt::Display for MapView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            writeln!(f, "{row}")?;
        }
        Ok(())
    }
}

/// Actor details shown next to the map.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActorPresentation {
    /// Committed cell.
    pub cell: CellCoord,
    /// Direction the actor faces.
    pub facing: Direction,
    /// World position of the root.
    pub position: Vec3,
}

/// Presentation descriptor consumed by rendering backends.
#[derive(Clone, Debug, PartialEq)]
pub struct Presentation {
    /// Heading printed above the map.
    pub title: String,
    /// Map of the level.
    pub map: MapView,
    /// Actor status, when an actor is present.
    pub actor: Option<ActorPresentation>,
}

impl Presentation {
    /// Constructs a new presentation descriptor.
    #[must_use]
    pub fn new<T>(title: T, map: MapView, actor: Option<ActorPresentation>) -> Self
    where
        T: Into<String>,
    {
        Self {
            title: title.into(),
            map,
            actor,
        }
    }
}

/// Rendering backend capable of presenting hopgrid levels.
pub trait RenderingBackend {
    /// Presents one frame.
    fn present(&mut self, presentation: &Presentation) -> AnyResult<()>;
}

/// Backend that writes plain text frames to any writer.
#[derive(Debug)]
pub struct TextBackend<W> {
    out: W,
}

impl<W: Write> TextBackend<W> {
    /// Wraps the writer.
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RenderingBackend for TextBackend<W> {
    fn present(&mut self, presentation: &Presentation) -> AnyResult<()> {
        writeln!(self.out, "{}", presentation.title).context("failed to write title")?;
        write!(self.out, "{}", presentation.map).context("failed to write map")?;
        if let Some(actor) = presentation.actor {
            writeln!(
                self.out,
                "actor at ({}, {}) facing {:?}, root ({:.2}, {:.2}, {:.2})",
                actor.cell.column(),
                actor.cell.row(),
                actor.facing,
                actor.position.x,
                actor.position.y,
                actor.position.z,
            )
            .context("failed to write actor status")?;
        }
        self.out.flush().context("failed to flush frame")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hopgrid_core::{GridFrame, GridFrameConfig, OccupancyGrid, RewardCell};
    use hopgrid_world::WorldConfig;

    fn world() -> World {
        let frame = GridFrame::new(&GridFrameConfig {
            width: 5,
            height: 4,
            ..GridFrameConfig::default()
        })
        .expect("valid frame");
        let mut grid = OccupancyGrid::new(5, 4);
        grid.set_occupied(CellCoord::new(0, 3), true);
        World::new(
            frame,
            grid.freeze(),
            Some(RewardCell::at(CellCoord::new(3, 2))),
            WorldConfig::default(),
        )
        .expect("matching dimensions")
    }

    #[test]
    fn map_draws_north_up() {
        let map = MapView::capture(&world(), Some(CellCoord::new(0, 0)));

        assert_eq!(map.rows(), ["#.+++", "..+R+", "..+++", "@...."]);
        assert_eq!(map.glyph(CellCoord::new(0, 3)), Some(OBSTACLE_GLYPH));
        assert_eq!(map.glyph(CellCoord::new(3, 2)), Some(REWARD_GLYPH));
        assert_eq!(map.glyph(CellCoord::new(5, 0)), None);
        assert_eq!(map.glyph(CellCoord::new(0, 4)), None);
    }

    #[test]
    fn text_backend_writes_title_map_and_actor() {
        let map = MapView::capture(&world(), None);
        let presentation = Presentation::new(
            "seed 1",
            map,
            Some(ActorPresentation {
                cell: CellCoord::new(1, 1),
                facing: Direction::East,
                position: Vec3::new(1.5, 0.0, 1.5),
            }),
        );
        let mut backend = TextBackend::new(Vec::new());

        backend.present(&presentation).expect("writing to memory");

        let text = String::from_utf8(backend.into_inner()).expect("utf8 output");
        assert_eq!(
            text,
            "seed 1\n#.+++\n..+R+\n..+++\n.....\nactor at (1, 1) facing East, root (1.50, 0.00, 1.50)\n"
        );
    }

    #[test]
    fn recorder_forgets_placements_on_clear() {
        let mut recorder = SceneRecorder::default();
        recorder.place(PlacementKind::Obstacle { variant: 0 }, Vec3::ZERO, Quat::IDENTITY);
        recorder.place(PlacementKind::Reward, Vec3::ONE, Quat::IDENTITY);
        assert_eq!(recorder.obstacle_count(), 1);

        recorder.clear_all();
        assert!(recorder.placements().is_empty());
        assert_eq!(recorder.clears(), 1);
    }
}
