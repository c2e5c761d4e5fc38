use std::{fs, path::Path};

use anyhow::{bail, Context, Result as AnyResult};
use hopgrid_core::{Direction, GridFrameConfig};
use hopgrid_system_bootstrap::LevelConfig;
use hopgrid_system_layout::LayoutConfig;
use hopgrid_system_movement::MovementConfig;
use hopgrid_world::WorldConfig;
use serde::{Deserialize, Serialize};

/// Settings file layout; every table and key is optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub(crate) grid: GridFrameConfig,
    pub(crate) layout: LayoutConfig,
    pub(crate) movement: MovementConfig,
    pub(crate) world: WorldConfig,
}

impl AppConfig {
    /// Reads the TOML file at `path`, or returns defaults when there is none.
    pub(crate) fn load(path: Option<&Path>) -> AnyResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub(crate) fn parse(text: &str) -> AnyResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub(crate) fn level(&self) -> LevelConfig {
        LevelConfig {
            grid: self.grid.clone(),
            layout: self.layout.clone(),
            world: self.world.clone(),
        }
    }
}

/// Parses a walk such as `NNEES` into directions; whitespace and commas are skipped.
pub(crate) fn parse_path(text: &str) -> AnyResult<Vec<Direction>> {
    text.chars()
        .filter(|symbol| !symbol.is_whitespace() && *symbol != ',')
        .map(|symbol| match symbol.to_ascii_uppercase() {
            'N' => Ok(Direction::North),
            'E' => Ok(Direction::East),
            'S' => Ok(Direction::South),
            'W' => Ok(Direction::West),
            other => bail!("unknown direction {other:?}, expected one of N, E, S, W"),
        })
        .collect()
}
