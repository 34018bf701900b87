#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Thresholds driving the analysis.
///
/// The defaults are tuned for ladder-sized maps; tests may shrink them to
/// analyze small hand-made grids.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct AnalysisConfig {
    /// Sea components at most this large may be reclassified as lakes.
    pub lake_max_minitiles: usize,
    /// Lakes must also fit in a square of this width.
    pub lake_max_width_minitiles: i32,

    /// Temporary areas below this size are merged into a neighbour.
    pub area_min_minitiles: usize,
    /// Two growing areas merge if the smaller one is below this size...
    pub merge_size_threshold: usize,
    /// ...or if its peak altitude is below this...
    pub merge_altitude_threshold: u16,
    /// ...or if the contact altitude reaches this fraction of either peak.
    pub merge_altitude_ratio: f64,
    /// Areas always merge within this many tiles of a starting location.
    pub start_location_merge_radius: i32,

    /// Frontier minitiles within this queen distance form one chokepoint.
    pub cluster_min_dist: i32,

    pub max_tiles_between_command_center_and_resources: i32,
    pub min_tiles_between_bases: i32,
    pub max_tiles_between_starting_location_and_base: i32,
    pub min_mineral_amount: u32,
    pub min_geyser_amount: u32,
    /// Minerals up to this amount do not prevent a base from being placed
    /// on top of them.
    pub blocking_mineral_max_amount: u32,

    /// Recompute reachability when a blocking neutral is destroyed.
    pub automatic_path_update: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let lake_max_minitiles = 300;
        Self {
            lake_max_minitiles,
            lake_max_width_minitiles: 8 * 4,
            area_min_minitiles: 64,
            merge_size_threshold: 80,
            merge_altitude_threshold: 80,
            merge_altitude_ratio: 0.90,
            start_location_merge_radius: 3,
            cluster_min_dist: (lake_max_minitiles as f64).sqrt() as i32,
            max_tiles_between_command_center_and_resources: 10,
            min_tiles_between_bases: 10,
            max_tiles_between_starting_location_and_base: 3,
            min_mineral_amount: 40,
            min_geyser_amount: 300,
            blocking_mineral_max_amount: 8,
            automatic_path_update: false,
        }
    }
}
