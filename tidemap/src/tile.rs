//! Tile types of the map and compact sets of them.

use std::fmt;

use glam::Vec2;


/// The terrain category of a single grid cell. Land pieces form a 3x3 coastline quilt,
/// the eight directional pieces surround the interior [`Tile::LandMiddle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Tile {
    Water = 0,
    Rock = 1,
    LandTopLeft = 2,
    LandTopMiddle = 3,
    LandTopRight = 4,
    LandLeftMiddle = 5,
    LandMiddle = 6,
    LandRightMiddle = 7,
    LandBottomLeft = 8,
    LandBottomMiddle = 9,
    LandBottomRight = 10,
}

impl Tile {

    /// Number of tile types.
    pub const COUNT: usize = 11;

    /// Every tile type, ordered by id.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Water,
        Self::Rock,
        Self::LandTopLeft,
        Self::LandTopMiddle,
        Self::LandTopRight,
        Self::LandLeftMiddle,
        Self::LandMiddle,
        Self::LandRightMiddle,
        Self::LandBottomLeft,
        Self::LandBottomMiddle,
        Self::LandBottomRight,
    ];

    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    /// Return true for the nine land pieces, water and rock are not land.
    #[inline]
    pub fn is_land(self) -> bool {
        self.id() >= Self::LandTopLeft.id()
    }

    /// Return true if the given position, local to this tile and in world units, is
    /// inside the solid part of the tile. Coastline pieces are only solid on their
    /// landward half or quadrant, rocks on a small square centered in the tile.
    pub fn collides_at(self, local: Vec2, tile_size: f32) -> bool {

        let half = tile_size / 2.0;
        let (x, y) = (local.x, local.y);

        match self {
            Tile::Water => false,
            Tile::Rock => {
                let reach = tile_size / 8.0;
                (x - half).abs() <= reach && (y - half).abs() <= reach
            }
            Tile::LandTopLeft => x >= half && y >= half,
            Tile::LandTopMiddle => y >= half,
            Tile::LandTopRight => x <= half && y >= half,
            Tile::LandLeftMiddle => x >= half,
            Tile::LandMiddle => true,
            Tile::LandRightMiddle => x <= half,
            Tile::LandBottomLeft => x >= half && y <= half,
            Tile::LandBottomMiddle => y <= half,
            Tile::LandBottomRight => x <= half && y <= half,
        }

    }

}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Classification helper for collaborators that read the map, an absent tile (section
/// not yet generated) is never land.
#[inline]
pub fn is_land_tile(tile: Option<Tile>) -> bool {
    tile.is_some_and(Tile::is_land)
}


/// A set of unique tile types, used as the possibility set of a cell and as the
/// allowed set of a grammar rule.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct TileSet {
    /// Presence of tiles are encoded bit by bit, the index of each tile is its id.
    inner: u16,
}

impl TileSet {

    /// The empty set.
    pub const EMPTY: Self = Self { inner: 0 };
    /// The set of every tile type.
    pub const FULL: Self = Self { inner: (1 << Tile::COUNT) - 1 };

    /// Create a new empty set.
    #[inline]
    pub const fn new() -> Self {
        Self::EMPTY
    }

    /// Create a set holding only the given tile.
    #[inline]
    pub const fn single(tile: Tile) -> Self {
        Self { inner: 1 << tile as u8 }
    }

    /// Create a set from a constant list of tiles.
    pub const fn of(tiles: &[Tile]) -> Self {
        let mut inner = 0;
        let mut i = 0;
        while i < tiles.len() {
            inner |= 1 << tiles[i] as u8;
            i += 1;
        }
        Self { inner }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.inner == 0
    }

    /// Number of tiles in the set, this is the entropy of a cell.
    #[inline]
    pub fn len(self) -> usize {
        self.inner.count_ones() as usize
    }

    #[inline]
    pub fn insert(&mut self, tile: Tile) -> bool {
        let prev = self.inner;
        self.inner |= 1 << tile as u8;
        self.inner != prev
    }

    #[inline]
    pub fn remove(&mut self, tile: Tile) -> bool {
        let prev = self.inner;
        self.inner &= !(1 << tile as u8);
        self.inner != prev
    }

    #[inline]
    pub fn contains(self, tile: Tile) -> bool {
        self.inner & (1 << tile as u8) != 0
    }

    #[inline]
    pub fn intersection(self, other: Self) -> Self {
        Self { inner: self.inner & other.inner }
    }

    #[inline]
    pub fn union(self, other: Self) -> Self {
        Self { inner: self.inner | other.inner }
    }

    #[inline]
    pub fn is_subset(self, other: Self) -> bool {
        self.inner & !other.inner == 0
    }

    /// Keep only the tiles matching the predicate.
    pub fn filter(self, mut pred: impl FnMut(Tile) -> bool) -> Self {
        self.iter().filter(|&tile| pred(tile)).collect()
    }

    /// Get the only tile of this set, if it contains exactly one.
    #[inline]
    pub fn only(self) -> Option<Tile> {
        if self.len() == 1 {
            Tile::from_id(self.inner.trailing_zeros() as u8)
        } else {
            None
        }
    }

    /// Iterate over tiles of this set in ascending id order.
    #[inline]
    pub fn iter(self) -> TileSetIter {
        TileSetIter { remaining: self.inner }
    }

    /// Collect the tiles into a stack array, returning it with the number of tiles
    /// written. Used to pick a random tile without allocating.
    pub fn to_array(self) -> ([Tile; Tile::COUNT], usize) {
        let mut tiles = [Tile::Water; Tile::COUNT];
        let mut len = 0;
        for tile in self.iter() {
            tiles[len] = tile;
            len += 1;
        }
        (tiles, len)
    }

}

impl fmt::Debug for TileSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<Tile> for TileSet {

    #[inline]
    fn from_iter<T: IntoIterator<Item = Tile>>(iter: T) -> Self {
        let mut set = TileSet::new();
        for tile in iter {
            set.insert(tile);
        }
        set
    }

}

impl IntoIterator for TileSet {
    type Item = Tile;
    type IntoIter = TileSetIter;
    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the tiles of a [`TileSet`].
#[derive(Debug, Clone)]
pub struct TileSetIter {
    remaining: u16,
}

impl Iterator for TileSetIter {

    type Item = Tile;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.remaining.trailing_zeros() as u8;
        self.remaining &= self.remaining - 1;
        Tile::from_id(id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.remaining.count_ones() as usize;
        (len, Some(len))
    }

}

impl ExactSizeIterator for TileSetIter {}
