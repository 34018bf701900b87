/// Altitude of every minitile: its distance to the nearest sea
pub mod altitude;
/// Resource sites where a main building can be placed
pub mod base;
/// Passages between two adjacent areas
pub mod chokepoint;
pub mod config;
mod disjoint_set;
pub mod error;
/// Distances and reachability between chokepoints
pub mod graph;
/// The analyzed map: areas, chokepoints and bases, and the queries over them
pub mod map;
/// Minerals, geysers and static buildings: the map objects owned by nobody.
///
/// Neutrals live in an arena and are referred to by [`NeutralId`]. Every tile
/// of a footprint points at the bottom neutral of the stack occupying it;
/// neutrals sharing the exact same footprint are chained bottom to top
/// through [`Neutral::next_stacked`].
pub mod neutral;
/// Pixel, minitile and tile coordinates. A tile is 32x32 pixels and holds
/// 4x4 minitiles of 8x8 pixels each.
pub mod position;
/// Holds the watershed segmentation of minitiles into areas
pub mod region_analysis;
pub mod search;
/// The one-shot description of a map handed over by the host simulation
pub mod snapshot;
/// The two-resolution terrain grid: tiles for building, minitiles for walking
pub mod terrain;
mod tile_map;

pub use crate::base::{Base, BaseId};
pub use crate::chokepoint::{ChokePoint, ChokePointId, Node};
pub use crate::config::AnalysisConfig;
pub use crate::error::{MapError, Result};
pub use crate::graph::ChokePointPath;
pub use crate::map::Map;
pub use crate::neutral::{Neutral, NeutralId};
pub use crate::position::{Position, TilePosition, WalkPosition};
pub use crate::region_analysis::{Area, AreaId};
pub use crate::snapshot::{MapSnapshot, NeutralKind, NeutralSnapshot, UnitId};
pub use crate::terrain::{Ground, MiniTile, Tile, TileArea};

/// Analyzes a map: altitudes, areas, chokepoints, the graph between them
/// and bases, with starting locations matched to bases.
pub fn analyze_map(snapshot: &MapSnapshot, config: &AnalysisConfig) -> Result<Map> {
    Map::initialize(snapshot, config.clone())
}
