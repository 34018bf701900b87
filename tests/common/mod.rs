#![allow(dead_code)]

use std::sync::Once;

use terrain_regions::{MapSnapshot, NeutralSnapshot, TilePosition, WalkPosition};

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub const MINERAL_AMOUNT: u32 = 1500;

/// A two-tile-thick wall over the whole map height at tile column `x`,
/// with a two-tile-high opening starting at each row of `gaps`.
pub fn wall_with_gaps(snapshot: &mut MapSnapshot, x: i32, gaps: &[i32]) {
    let mut y = 0;
    for gap in gaps {
        if *gap > y {
            snapshot.block_tiles(TilePosition::new(x, y), TilePosition::new(2, gap - y));
        }
        y = gap + 2;
    }
    if y < snapshot.height_tiles {
        snapshot.block_tiles(TilePosition::new(x, y), TilePosition::new(2, snapshot.height_tiles - y));
    }
}

/// A vertical line of 2x1 minerals at tile column `x`, rows `first_row..=last_row`.
pub fn mineral_line(snapshot: &mut MapSnapshot, first_id: u32, x: i32, first_row: i32, last_row: i32) {
    for (i, y) in (first_row..=last_row).enumerate() {
        snapshot
            .neutrals
            .push(NeutralSnapshot::mineral(first_id + i as u32, TilePosition::new(x, y), MINERAL_AMOUNT));
    }
}

/// Two rooms joined through a gap in the middle wall, each with a mineral
/// line and a starting location.
pub fn two_rooms() -> MapSnapshot {
    let mut snapshot = MapSnapshot::new(64, 32);
    wall_with_gaps(&mut snapshot, 31, &[15]);
    mineral_line(&mut snapshot, 1, 3, 10, 18);
    mineral_line(&mut snapshot, 101, 59, 10, 18);
    snapshot.starting_locations = vec![TilePosition::new(8, 14), TilePosition::new(52, 14)];
    snapshot
}

/// Two halves whose only opening is plugged by a static building.
pub const PLUG_UNIT: u32 = 500;

pub fn plugged_gap() -> MapSnapshot {
    let mut snapshot = MapSnapshot::new(48, 24);
    wall_with_gaps(&mut snapshot, 23, &[11]);
    snapshot.neutrals.push(NeutralSnapshot::static_building(
        PLUG_UNIT,
        TilePosition::new(23, 11),
        TilePosition::new(2, 2),
    ));
    snapshot
}

/// Three rooms in a row: two openings between the first two, one between
/// the last two.
pub fn three_rooms() -> MapSnapshot {
    let mut snapshot = MapSnapshot::new(96, 32);
    wall_with_gaps(&mut snapshot, 31, &[7, 23]);
    wall_with_gaps(&mut snapshot, 63, &[15]);
    snapshot
}

/// Two halves joined through two openings a few minitiles apart, with a
/// small pillar between them.
pub fn twin_openings() -> MapSnapshot {
    let mut snapshot = MapSnapshot::new(64, 32);
    wall_with_gaps(&mut snapshot, 31, &[13, 17]);
    snapshot
}

/// Two halves with no opening at all. Only the left one has resources.
pub fn sealed_halves() -> MapSnapshot {
    let mut snapshot = MapSnapshot::new(48, 32);
    wall_with_gaps(&mut snapshot, 23, &[]);
    mineral_line(&mut snapshot, 1, 3, 10, 18);
    snapshot.starting_locations = vec![TilePosition::new(8, 14)];
    snapshot
}

/// Every minitile of the map.
pub fn all_walk_positions(snapshot: &MapSnapshot) -> impl Iterator<Item = WalkPosition> {
    let (width, height) = (snapshot.width_walks(), snapshot.height_walks());
    (0..height).flat_map(move |y| (0..width).map(move |x| WalkPosition::new(x, y)))
}
