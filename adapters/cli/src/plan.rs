//! Scenario files and scripted tower orders.

use std::{path::Path, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use immune_defence_core::{SimulationConfig, TowerKind, WorldPoint};
use serde::Deserialize;
use thiserror::Error;

/// Tower deployment scheduled for a point in simulated time.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub(crate) struct TowerOrder {
    pub(crate) kind: TowerKind,
    pub(crate) x: f32,
    pub(crate) y: f32,
    #[serde(default)]
    pub(crate) at_secs: f32,
}

impl TowerOrder {
    pub(crate) fn position(&self) -> WorldPoint {
        WorldPoint::new(self.x, self.y)
    }

    pub(crate) fn due(&self) -> Duration {
        Duration::from_secs_f32(self.at_secs.max(0.0))
    }
}

/// Errors raised while parsing a `--tower` argument.
#[derive(Debug, PartialEq, Error)]
pub(crate) enum OrderParseError {
    #[error("expected KIND@X,Y[@SECS], found `{0}`")]
    Shape(String),
    #[error("unknown tower kind `{0}`")]
    Kind(String),
    #[error("invalid number `{0}`")]
    Number(String),
}

impl FromStr for TowerOrder {
    type Err = OrderParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.trim().split('@');
        let (Some(kind), Some(position)) = (parts.next(), parts.next()) else {
            return Err(OrderParseError::Shape(value.to_owned()));
        };
        let at_secs = parts.next().map(number).transpose()?.unwrap_or(0.0);
        if parts.next().is_some() {
            return Err(OrderParseError::Shape(value.to_owned()));
        }

        let Some((x, y)) = position.split_once(',') else {
            return Err(OrderParseError::Shape(value.to_owned()));
        };

        Ok(Self {
            kind: tower_kind(kind)?,
            x: number(x)?,
            y: number(y)?,
            at_secs,
        })
    }
}

fn tower_kind(name: &str) -> Result<TowerKind, OrderParseError> {
    match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "neutrophil" => Ok(TowerKind::Neutrophil),
        "b_cell" | "bcell" => Ok(TowerKind::BCell),
        "t_cell" | "tcell" => Ok(TowerKind::TCell),
        "macrophage" => Ok(TowerKind::Macrophage),
        _ => Err(OrderParseError::Kind(name.to_owned())),
    }
}

fn number(value: &str) -> Result<f32, OrderParseError> {
    value
        .trim()
        .parse()
        .map_err(|_| OrderParseError::Number(value.to_owned()))
}

/// Contents of a scenario file: the simulation configuration plus the tower
/// orders to replay.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Scenario {
    pub(crate) simulation: SimulationConfig,
    pub(crate) towers: Vec<TowerOrder>,
}

impl Scenario {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("failed to parse scenario {}", path.display()))
    }
}
