#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the hopgrid engine.
//!
//! This crate defines the coordinate model and the seams that connect the
//! layout generator, the movement controller and the adapters. A
//! [`GridFrame`] converts between discrete cells and continuous world
//! positions, an [`OccupancyGrid`] is filled during generation and then frozen
//! into an immutable [`OccupancyModel`], and the [`SpatialQuery`],
//! [`Instantiator`] and [`InputSource`] traits describe the external
//! collaborators the core consumes but never owns.

use std::collections::VecDeque;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Side length of the square block reserved for the reward object.
pub const REWARD_BLOCK_SIZE: u32 = 3;

/// Cardinal step directions available to an actor.
///
/// North points along increasing rows (world `+Z`), east along increasing
/// columns (world `+X`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Movement toward increasing row indices.
    North,
    /// Movement toward increasing column indices.
    East,
    /// Movement toward decreasing row indices.
    South,
    /// Movement toward decreasing column indices.
    West,
}

impl Direction {
    /// Every direction in clockwise order starting at north.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Column and row delta applied by a single step in this direction.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, 1),
            Self::East => (1, 0),
            Self::South => (0, -1),
            Self::West => (-1, 0),
        }
    }

    /// Yaw around the vertical axis, in radians, that faces this direction.
    ///
    /// North maps to zero and east to a quarter turn, so rotating world `+Z`
    /// by the yaw yields the step direction on the ground plane.
    #[must_use]
    pub fn yaw(self) -> f32 {
        let (dx, dy) = self.offset();
        (dx as f32).atan2(dy as f32)
    }
}

/// Location of a single grid cell expressed as column and row coordinates.
///
/// Coordinates are signed so that a step off the edge of the grid can be
/// represented and then rejected by bounds checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: i32,
    row: i32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: i32, row: i32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> i32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> i32 {
        self.row
    }

    /// Cell reached by a single step in the provided direction.
    #[must_use]
    pub const fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Self {
            column: self.column.saturating_add(dx),
            row: self.row.saturating_add(dy),
        }
    }
}

/// Axis-aligned rectangle expressed in cell coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRect {
    origin: CellCoord,
    size: CellRectSize,
}

impl CellRect {
    /// Constructs a rectangle from an origin cell and size.
    #[must_use]
    pub const fn from_origin_and_size(origin: CellCoord, size: CellRectSize) -> Self {
        Self { origin, size }
    }

    /// Constructs the square of side `size` anchored at `origin`.
    #[must_use]
    pub const fn square(origin: CellCoord, size: u32) -> Self {
        Self::from_origin_and_size(origin, CellRectSize::new(size, size))
    }

    /// Lowest-indexed cell that anchors the rectangle.
    #[must_use]
    pub const fn origin(&self) -> CellCoord {
        self.origin
    }

    /// Dimensions of the rectangle measured in whole cells.
    #[must_use]
    pub const fn size(&self) -> CellRectSize {
        self.size
    }

    /// Returns `true` when the rectangle covers no cells.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size.width == 0 || self.size.height == 0
    }

    /// Grows the rectangle by `margin` cells on every side.
    #[must_use]
    pub fn expanded(self, margin: u32) -> Self {
        let signed = i32::try_from(margin).unwrap_or(i32::MAX);
        Self {
            origin: CellCoord::new(
                self.origin.column.saturating_sub(signed),
                self.origin.row.saturating_sub(signed),
            ),
            size: CellRectSize::new(
                self.size.width.saturating_add(margin.saturating_mul(2)),
                self.size.height.saturating_add(margin.saturating_mul(2)),
            ),
        }
    }

    /// Clips the rectangle to a `columns × rows` grid anchored at cell zero.
    ///
    /// Returns `None` when nothing of the rectangle lies inside the grid.
    #[must_use]
    pub fn clipped(self, columns: u32, rows: u32) -> Option<Self> {
        if self.is_empty() {
            return None;
        }

        let min_column = i64::from(self.origin.column).max(0);
        let min_row = i64::from(self.origin.row).max(0);
        let max_column =
            (i64::from(self.origin.column) + i64::from(self.size.width)).min(i64::from(columns));
        let max_row =
            (i64::from(self.origin.row) + i64::from(self.size.height)).min(i64::from(rows));

        if min_column >= max_column || min_row >= max_row {
            return None;
        }

        Some(Self {
            origin: CellCoord::new(
                i32::try_from(min_column).ok()?,
                i32::try_from(min_row).ok()?,
            ),
            size: CellRectSize::new(
                u32::try_from(max_column - min_column).ok()?,
                u32::try_from(max_row - min_row).ok()?,
            ),
        })
    }

    /// Reports whether the rectangle covers the provided cell.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        let column = i64::from(cell.column) - i64::from(self.origin.column);
        let row = i64::from(cell.row) - i64::from(self.origin.row);
        (0..i64::from(self.size.width)).contains(&column)
            && (0..i64::from(self.size.height)).contains(&row)
    }

    /// Reports whether two rectangles share at least one cell.
    #[must_use]
    pub fn intersects(&self, other: &CellRect) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }

        let (a_min_x, a_max_x) = self.column_span();
        let (a_min_y, a_max_y) = self.row_span();
        let (b_min_x, b_max_x) = other.column_span();
        let (b_min_y, b_max_y) = other.row_span();
        a_min_x < b_max_x && b_min_x < a_max_x && a_min_y < b_max_y && b_min_y < a_max_y
    }

    /// Iterates every covered cell, columns outer and rows inner.
    pub fn cells(&self) -> impl Iterator<Item = CellCoord> {
        let origin = self.origin;
        let width = i32::try_from(self.size.width).unwrap_or(i32::MAX);
        let height = i32::try_from(self.size.height).unwrap_or(i32::MAX);
        (0..width).flat_map(move |dx| {
            (0..height).map(move |dy| {
                CellCoord::new(
                    origin.column.saturating_add(dx),
                    origin.row.saturating_add(dy),
                )
            })
        })
    }

    fn column_span(&self) -> (i64, i64) {
        let min = i64::from(self.origin.column);
        (min, min + i64::from(self.size.width))
    }

    fn row_span(&self) -> (i64, i64) {
        let min = i64::from(self.origin.row);
        (min, min + i64::from(self.size.height))
    }
}

/// Size of a [`CellRect`] measured in whole cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRectSize {
    width: u32,
    height: u32,
}

impl CellRectSize {
    /// Creates a new size descriptor with explicit dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width of the rectangle in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the rectangle in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }
}

/// Explicit parameters used to construct a [`GridFrame`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridFrameConfig {
    /// Number of cell columns along world `+X`.
    pub width: u32,
    /// Number of cell rows along world `+Z`.
    pub height: u32,
    /// Side length of a single square cell in world units.
    pub cell_size: f32,
    /// World position of the grid pivot.
    pub position: Vec3,
    /// Flat ground height used when no ground is found under a cell.
    pub ground_level: f32,
    /// Interprets `position` as the grid center rather than its corner.
    pub origin_is_center: bool,
}

impl Default for GridFrameConfig {
    fn default() -> Self {
        Self {
            width: 20,
            height: 20,
            cell_size: 1.0,
            position: Vec3::ZERO,
            ground_level: 0.0,
            origin_is_center: false,
        }
    }
}

/// Reasons a [`GridFrameConfig`] cannot describe a usable grid.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum FrameError {
    /// Both dimensions must be strictly positive.
    #[error("grid dimensions must be positive, got {width}x{height}")]
    NonPositiveDimensions {
        /// Provided column count.
        width: u32,
        /// Provided row count.
        height: u32,
    },
    /// Cells must have a finite, strictly positive size.
    #[error("cell size must be finite and positive, got {cell_size}")]
    InvalidCellSize {
        /// Provided cell size.
        cell_size: f32,
    },
}

/// Validated coordinate system mapping grid cells to world positions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridFrame {
    width: u32,
    height: u32,
    cell_size: f32,
    position: Vec3,
    ground_level: f32,
    origin_is_center: bool,
}

impl GridFrame {
    /// Validates the configuration and builds the frame.
    pub fn new(config: &GridFrameConfig) -> Result<Self, FrameError> {
        if config.width == 0 || config.height == 0 {
            return Err(FrameError::NonPositiveDimensions {
                width: config.width,
                height: config.height,
            });
        }
        if !config.cell_size.is_finite() || config.cell_size <= 0.0 {
            return Err(FrameError::InvalidCellSize {
                cell_size: config.cell_size,
            });
        }

        Ok(Self {
            width: config.width,
            height: config.height,
            cell_size: config.cell_size,
            position: config.position,
            ground_level: config.ground_level,
            origin_is_center: config.origin_is_center,
        })
    }

    /// Number of columns contained in the grid.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows contained in the grid.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Side length of a single cell in world units.
    #[must_use]
    pub const fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Height used when the spatial query reports no ground.
    #[must_use]
    pub const fn ground_level(&self) -> f32 {
        self.ground_level
    }

    /// Reports whether the cell lies within `[0, width) × [0, height)`.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        u32::try_from(cell.column()).is_ok_and(|column| column < self.width)
            && u32::try_from(cell.row()).is_ok_and(|row| row < self.height)
    }

    /// World-space corner of the grid from which cell centers are measured.
    #[must_use]
    pub fn origin(&self) -> Vec3 {
        if self.origin_is_center {
            Vec3::new(
                self.position.x - self.width as f32 * 0.5 * self.cell_size,
                self.position.y,
                self.position.z - self.height as f32 * 0.5 * self.cell_size,
            )
        } else {
            self.position
        }
    }

    /// Horizontal center of the cell, placed at the flat ground level.
    #[must_use]
    pub fn cell_center(&self, cell: CellCoord) -> Vec3 {
        let origin = self.origin();
        Vec3::new(
            origin.x + (cell.column() as f32 + 0.5) * self.cell_size,
            self.ground_level,
            origin.z + (cell.row() as f32 + 0.5) * self.cell_size,
        )
    }

    /// Center of the cell resting on whatever ground the query reports.
    ///
    /// Falls back to the configured ground level when no ground is found.
    #[must_use]
    pub fn cell_to_world<S>(&self, cell: CellCoord, space: &S, ground_mask: LayerMask) -> Vec3
    where
        S: SpatialQuery + ?Sized,
    {
        let mut point = self.cell_center(cell);
        point.y = space
            .ground_height(point, ground_mask)
            .unwrap_or(self.ground_level);
        point
    }

    /// Cell whose center lies nearest to the provided world position.
    #[must_use]
    pub fn world_to_cell(&self, point: Vec3) -> CellCoord {
        let origin = self.origin();
        let gx = (point.x - origin.x) / self.cell_size - 0.5;
        let gy = (point.z - origin.z) / self.cell_size - 0.5;
        CellCoord::new(round_to_cell(gx), round_to_cell(gy))
    }
}

fn round_to_cell(value: f32) -> i32 {
    // Saturating float-to-int cast; NaN maps to zero.
    value.round_ties_even() as i32
}

/// Index of a single collision layer, in `0..32`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollisionLayer(u8);

impl CollisionLayer {
    /// Terrain the actor stands on.
    pub const GROUND: Self = Self(0);
    /// Layer occupied by actors.
    pub const ACTOR: Self = Self(1);
    /// Layer occupied by generated obstacle instances.
    pub const OBSTACLE: Self = Self(2);
    /// Layer occupied by the reward object.
    pub const REWARD: Self = Self(3);

    /// Creates a layer from its index, rejecting indices past 31.
    #[must_use]
    pub const fn new(index: u8) -> Option<Self> {
        if index < 32 {
            Some(Self(index))
        } else {
            None
        }
    }

    const fn bit(self) -> u32 {
        1 << (self.0 & 31)
    }
}

/// Set of collision layers considered by a spatial query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerMask(u32);

impl LayerMask {
    /// Mask that matches every layer.
    pub const ALL: Self = Self(u32::MAX);
    /// Mask that matches nothing.
    pub const NONE: Self = Self(0);

    /// Mask containing a single layer.
    #[must_use]
    pub const fn of(layer: CollisionLayer) -> Self {
        Self(layer.bit())
    }

    /// Adds a layer to the mask.
    #[must_use]
    pub const fn with(self, layer: CollisionLayer) -> Self {
        Self(self.0 | layer.bit())
    }

    /// Removes a layer from the mask.
    #[must_use]
    pub const fn without(self, layer: CollisionLayer) -> Self {
        Self(self.0 & !layer.bit())
    }

    /// Reports whether the layer is part of the mask.
    #[must_use]
    pub const fn contains(self, layer: CollisionLayer) -> bool {
        self.0 & layer.bit() != 0
    }
}

/// Point and volume queries against world geometry.
///
/// Implementations must honour `mask`; callers remove their own layer from
/// it so that an actor never collides with itself.
pub trait SpatialQuery {
    /// Height of the highest ground surface under `point`, if any.
    fn ground_height(&self, point: Vec3, mask: LayerMask) -> Option<f32>;

    /// Reports whether any collider in `mask` overlaps the axis-aligned box.
    fn overlaps_box(&self, center: Vec3, half_extents: Vec3, mask: LayerMask) -> bool;
}

impl<T> SpatialQuery for &T
where
    T: SpatialQuery + ?Sized,
{
    fn ground_height(&self, point: Vec3, mask: LayerMask) -> Option<f32> {
        (**self).ground_height(point, mask)
    }

    fn overlaps_box(&self, center: Vec3, half_extents: Vec3, mask: LayerMask) -> bool {
        (**self).overlaps_box(center, half_extents, mask)
    }
}

/// Geometry-free space: never any ground, never any overlap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EmptySpace;

impl SpatialQuery for EmptySpace {
    fn ground_height(&self, _point: Vec3, _mask: LayerMask) -> Option<f32> {
        None
    }

    fn overlaps_box(&self, _center: Vec3, _half_extents: Vec3, _mask: LayerMask) -> bool {
        false
    }
}

/// Kinds of visual instances emitted for a generated level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlacementKind {
    /// One obstacle on an occupied cell.
    Obstacle {
        /// Index of the obstacle variant chosen for the instance.
        variant: u32,
    },
    /// The single reward object.
    Reward,
}

/// Renderer-side collaborator that creates visual instances.
pub trait Instantiator {
    /// Places one instance at the world position with the given rotation.
    fn place(&mut self, kind: PlacementKind, position: Vec3, rotation: Quat);

    /// Removes every instance previously placed.
    fn clear_all(&mut self);
}

/// Source of at most one directional intent per simulation tick.
pub trait InputSource {
    /// Intent for the current tick, or `None` when nothing was requested.
    fn poll(&mut self) -> Option<Direction>;
}

/// Input source replaying a fixed sequence of per-tick intents.
#[derive(Clone, Debug, Default)]
pub struct ScriptedInput {
    intents: VecDeque<Option<Direction>>,
}

impl ScriptedInput {
    /// Creates a script from per-tick intents.
    #[must_use]
    pub fn new(intents: impl IntoIterator<Item = Option<Direction>>) -> Self {
        Self {
            intents: intents.into_iter().collect(),
        }
    }

    /// Number of ticks left in the script.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.intents.len()
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self) -> Option<Direction> {
        self.intents.pop_front().flatten()
    }
}

/// Anchor of the reserved reward block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RewardCell {
    center: CellCoord,
}

impl RewardCell {
    /// Creates a reward anchored at the provided center cell.
    #[must_use]
    pub const fn at(center: CellCoord) -> Self {
        Self { center }
    }

    /// Center cell of the reserved block.
    #[must_use]
    pub const fn center(&self) -> CellCoord {
        self.center
    }

    /// The full reserved block surrounding the center.
    #[must_use]
    pub const fn region(&self) -> CellRect {
        CellRect::square(
            CellCoord::new(self.center.column() - 1, self.center.row() - 1),
            REWARD_BLOCK_SIZE,
        )
    }
}

/// Mutable occupancy working set used while a layout is generated.
///
/// Out-of-bounds reads report `false` and out-of-bounds writes are ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OccupancyGrid {
    columns: u32,
    rows: u32,
    blocked: Vec<bool>,
    occupied: Vec<bool>,
}

impl OccupancyGrid {
    /// Allocates an empty grid with the provided dimensions.
    #[must_use]
    pub fn new(columns: u32, rows: u32) -> Self {
        let capacity_u64 = u64::from(columns) * u64::from(rows);
        let capacity = usize::try_from(capacity_u64).unwrap_or(0);
        Self {
            columns,
            rows,
            blocked: vec![false; capacity],
            occupied: vec![false; capacity],
        }
    }

    /// Provides the dimensions of the grid.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    /// Reports whether the cell is excluded from further placement.
    #[must_use]
    pub fn is_blocked(&self, cell: CellCoord) -> bool {
        self.index(cell)
            .and_then(|index| self.blocked.get(index).copied())
            .unwrap_or(false)
    }

    /// Reports whether the cell hosts an obstacle.
    #[must_use]
    pub fn is_occupied(&self, cell: CellCoord) -> bool {
        self.index(cell)
            .and_then(|index| self.occupied.get(index).copied())
            .unwrap_or(false)
    }

    /// Sets the blocked flag of a single cell.
    pub fn set_blocked(&mut self, cell: CellCoord, value: bool) {
        if let Some(slot) = self.index(cell).and_then(|index| self.blocked.get_mut(index)) {
            *slot = value;
        }
    }

    /// Sets the occupied flag of a single cell.
    pub fn set_occupied(&mut self, cell: CellCoord, value: bool) {
        if let Some(slot) = self
            .index(cell)
            .and_then(|index| self.occupied.get_mut(index))
        {
            *slot = value;
        }
    }

    /// Marks every in-bounds cell of the rectangle as blocked.
    pub fn block_region(&mut self, region: CellRect) {
        if let Some(clipped) = region.clipped(self.columns, self.rows) {
            for cell in clipped.cells() {
                self.set_blocked(cell, true);
            }
        }
    }

    /// Reports whether any in-bounds cell of the rectangle is blocked.
    #[must_use]
    pub fn region_has_blocked(&self, region: CellRect) -> bool {
        region
            .clipped(self.columns, self.rows)
            .is_some_and(|clipped| clipped.cells().any(|cell| self.is_blocked(cell)))
    }

    /// Hands the finished grid over as an immutable snapshot.
    #[must_use]
    pub fn freeze(self) -> OccupancyModel {
        OccupancyModel { grid: self }
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        let column = u32::try_from(cell.column()).ok()?;
        let row = u32::try_from(cell.row()).ok()?;
        if column < self.columns && row < self.rows {
            let row = usize::try_from(row).ok()?;
            let column = usize::try_from(column).ok()?;
            let width = usize::try_from(self.columns).ok()?;
            Some(row * width + column)
        } else {
            None
        }
    }
}

/// Immutable occupancy snapshot produced by a finished generation run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OccupancyModel {
    grid: OccupancyGrid,
}

impl OccupancyModel {
    /// Provides the dimensions of the snapshot.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        self.grid.dimensions()
    }

    /// Reports whether the cell was excluded from placement.
    #[must_use]
    pub fn is_blocked(&self, cell: CellCoord) -> bool {
        self.grid.is_blocked(cell)
    }

    /// Reports whether the cell hosts an obstacle.
    #[must_use]
    pub fn is_occupied(&self, cell: CellCoord) -> bool {
        self.grid.is_occupied(cell)
    }

    /// Iterates occupied cells, columns outer and rows inner.
    pub fn occupied_cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        self.all_cells().filter(|cell| self.grid.is_occupied(*cell))
    }

    /// Number of occupied cells within the rectangle.
    #[must_use]
    pub fn occupied_in(&self, region: CellRect) -> usize {
        let (columns, rows) = self.dimensions();
        region.clipped(columns, rows).map_or(0, |clipped| {
            clipped
                .cells()
                .filter(|cell| self.grid.is_occupied(*cell))
                .count()
        })
    }

    /// Number of occupied cells across the whole grid.
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.grid.occupied.iter().filter(|value| **value).count()
    }

    fn all_cells(&self) -> impl Iterator<Item = CellCoord> {
        let (columns, rows) = self.dimensions();
        CellRect::from_origin_and_size(CellCoord::new(0, 0), CellRectSize::new(columns, rows))
            .cells()
    }
}
