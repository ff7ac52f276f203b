//! Map grid labels for `find`.

use crate::host::{CommandHost, Position};

/// Edge length of one map grid cell, in metres.
pub const CELL_SIZE: f32 = 146.3;

/// Standard grid cell for a position in a square world centred on the origin.
///
/// Columns run `A..Z` west to east (wrapping past `Z`), rows count down from
/// the north edge.
pub fn position_to_grid(position: Position, world_size: f32) -> String {
    let half = world_size / 2.0;
    let rx = half + position.x;
    let rz = half + position.z;

    let column = ((rx / CELL_SIZE).floor() as i64).rem_euclid(26) as u8;
    let row = (world_size / CELL_SIZE).floor() as i64 - (rz / CELL_SIZE).floor() as i64 - 1;

    format!("{}{}", (b'A' + column) as char, row)
}

/// The host's own label if it has one, else the standard cell.
pub fn grid_label(host: &dyn CommandHost, position: Position) -> String {
    host.grid_label(position)
        .unwrap_or_else(|| position_to_grid(position, host.world_size()))
}
