use thiserror::Error;

use crate::position::{TilePosition, WalkPosition};
use crate::region_analysis::AreaId;
use crate::chokepoint::ChokePointId;
use crate::snapshot::UnitId;

pub type Result<T> = std::result::Result<T, MapError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MapError {
    #[error("invalid map snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("{what} {x},{y} is outside the map")]
    OutOfBounds { what: &'static str, x: i32, y: i32 },
    #[error("unknown area {0:?}")]
    UnknownArea(AreaId),
    #[error("unknown chokepoint {0:?}")]
    UnknownChokePoint(ChokePointId),
    #[error("unit {0:?} is not a registered neutral")]
    UnknownUnit(UnitId),

    #[error("starting location {0} could not be assigned to any base")]
    UnassignedStartingLocation(TilePosition),
    #[error("frontier between areas {0:?} and {1:?} is empty")]
    EmptyFrontier(AreaId, AreaId),
    #[error("search for {what} starting at {from} exhausted the map")]
    SearchExhausted { what: &'static str, from: WalkPosition },
    #[error("map invariant violated: {0}")]
    Invariant(String),
}

impl MapError {
    /// True when the error comes from a bad argument rather than from the
    /// map data itself. Such errors leave the map untouched.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            MapError::InvalidSnapshot(_)
                | MapError::OutOfBounds { .. }
                | MapError::UnknownArea(_)
                | MapError::UnknownChokePoint(_)
                | MapError::UnknownUnit(_)
        )
    }
}
