
/// Holds the area struct and its identifier
pub mod structs;

/// Holds the watershed growth that turns altitudes into areas
pub mod watershed;

/// Holds the raw frontiers recorded between adjacent areas
pub mod frontier;

pub use self::frontier::{Frontier, Frontiers};
pub use self::structs::{Area, AreaId};
pub use self::watershed::{segment_areas, AreaSeed, Segmentation};
