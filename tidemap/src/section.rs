//! A section storing a square sub-grid of tiles, the unit of lazy world generation.

use glam::{IVec2, Vec2};

use crate::tile::Tile;


/// Calculate the section coordinates containing the given world tile position.
#[inline]
pub fn calc_section_pos(pos: IVec2, size: u32) -> (i32, i32) {
    let size = size as i32;
    (pos.x.div_euclid(size), pos.y.div_euclid(size))
}

/// Calculate the position local to its section of the given world tile position, each
/// component is in `0..size`.
#[inline]
pub fn calc_local_pos(pos: IVec2, size: u32) -> (u32, u32) {
    let size = size as i32;
    (pos.x.rem_euclid(size) as u32, pos.y.rem_euclid(size) as u32)
}

/// Calculate the world tile position from section coordinates and a local position,
/// this is the inverse of [`calc_section_pos`] and [`calc_local_pos`].
#[inline]
pub fn calc_world_pos(sx: i32, sy: i32, lx: u32, ly: u32, size: u32) -> IVec2 {
    let size = size as i32;
    IVec2::new(sx * size + lx as i32, sy * size + ly as i32)
}

/// Calculate the world tile position under a continuous world position.
#[inline]
pub fn calc_tile_pos(pos: Vec2, tile_size: f32) -> IVec2 {
    (pos / tile_size).floor().as_ivec2()
}

/// Calculate the continuous world position of the center of a tile.
#[inline]
pub fn calc_tile_center(pos: IVec2, tile_size: f32) -> Vec2 {
    pos.as_vec2() * tile_size + Vec2::splat(tile_size / 2.0)
}


/// A square grid of concrete tiles, stored row by row.
#[derive(Clone, PartialEq, Eq)]
pub struct Section {
    /// Side length of the section, in tiles.
    size: u32,
    /// Tiles indexed by `y * size + x`.
    tiles: Box<[Tile]>,
}

impl Section {

    /// Create a new section full of water.
    pub fn new(size: u32) -> Self {
        Self::filled(size, Tile::Water)
    }

    /// Create a new section full of the given tile.
    pub fn filled(size: u32, tile: Tile) -> Self {
        Self {
            size,
            tiles: vec![tile; (size * size) as usize].into_boxed_slice(),
        }
    }

    /// Create a section from its tiles stored row by row, the number of tiles must
    /// be the square of the size.
    pub fn from_tiles(size: u32, tiles: Vec<Tile>) -> Self {
        assert_eq!(tiles.len(), (size * size) as usize, "tiles should fill the section");
        Self {
            size,
            tiles: tiles.into_boxed_slice(),
        }
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.size && y < self.size);
        (y * self.size + x) as usize
    }

    /// Return true if the given local position is inside this section.
    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.size && (y as u32) < self.size
    }

    /// Get the tile at the given local position.
    /// Panics if the position is outside of the section.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Tile {
        self.tiles[self.index(x, y)]
    }

    /// Set the tile at the given local position, returning the previous one.
    /// Panics if the position is outside of the section.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, tile: Tile) -> Tile {
        let index = self.index(x, y);
        std::mem::replace(&mut self.tiles[index], tile)
    }

    /// All tiles, row by row.
    #[inline]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Count the tiles matching the predicate.
    pub fn count(&self, mut pred: impl FnMut(Tile) -> bool) -> usize {
        self.tiles.iter().filter(|&&tile| pred(tile)).count()
    }

}

impl std::fmt::Debug for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Section")
            .field("size", &self.size)
            .field("land", &self.count(Tile::is_land))
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn addressing_round_trip() {
        for size in [1, 3, 100] {
            for x in [-250, -101, -100, -99, -1, 0, 1, 99, 100, 101, 250] {
                for y in [-7, 0, 42, 100, -100] {
                    let pos = IVec2::new(x, y);
                    let (sx, sy) = calc_section_pos(pos, size);
                    let (lx, ly) = calc_local_pos(pos, size);
                    assert!(lx < size && ly < size);
                    assert_eq!(calc_world_pos(sx, sy, lx, ly, size), pos);
                }
            }
        }
    }

    #[test]
    fn negative_positions_floor() {
        assert_eq!(calc_section_pos(IVec2::new(-1, -100), 100), (-1, -1));
        assert_eq!(calc_section_pos(IVec2::new(-101, 99), 100), (-2, 0));
        assert_eq!(calc_local_pos(IVec2::new(-1, -100), 100), (99, 0));
        assert_eq!(calc_tile_pos(Vec2::new(-0.5, 31.9), 32.0), IVec2::new(-1, 0));
        assert_eq!(calc_tile_center(IVec2::new(1, -1), 32.0), Vec2::new(48.0, -16.0));
    }

    #[test]
    fn get_set() {
        let mut section = Section::new(4);
        assert_eq!(section.count(|t| t == Tile::Water), 16);
        assert_eq!(section.set(3, 1, Tile::Rock), Tile::Water);
        assert_eq!(section.get(3, 1), Tile::Rock);
        assert_eq!(section.tiles()[4 + 3], Tile::Rock);
        assert!(section.contains(3, 3));
        assert!(!section.contains(4, 0));
        assert!(!section.contains(-1, 0));
    }

}
