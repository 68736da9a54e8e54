//! Tile adjacency grammar, the static table of which tiles may border which.
//!
//! The table is authored by hand, so a grammar is always checked with
//! [`Grammar::check`] before being handed to the generator: every rule must be
//! non-empty and every rule must be mirrored by the rule of the neighbor tile in the
//! opposite direction. Asymmetric rules are rejected, never repaired, because the
//! intent of such rule cannot be guessed.

use crate::tile::{Tile, TileSet};
use crate::util::Dir;


/// An adjacency grammar: for each tile type of the grammar and each direction, the set
/// of tiles allowed in the neighbor cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    /// The tile types this grammar generates, possibility sets start from this set.
    tiles: TileSet,
    /// Allowed neighbors indexed by `[tile id][direction index]`, no entry means that
    /// nothing is permitted.
    rules: [[Option<TileSet>; 4]; Tile::COUNT],
}

impl Grammar {

    /// Create a grammar generating the given tiles, without any rule yet.
    pub fn new(tiles: TileSet) -> Self {
        Self {
            tiles,
            rules: [[None; 4]; Tile::COUNT],
        }
    }

    /// The coastline grammar of the ocean map: water borders water, rocks and the
    /// seaward side of land pieces, rocks are only surrounded by water, each edge and
    /// corner piece only borders the pieces continuing its coastline and the interior
    /// land borders the four edge pieces and itself.
    ///
    /// Interior land never borders corner pieces directly: corners only accept the edge
    /// pieces continuing their coastline, and rules must be mirrored.
    pub fn coastline() -> Self {

        use Tile::*;

        let mut grammar = Self::new(TileSet::FULL);

        grammar.set_rules(Water, [
            &[Water, Rock, LandBottomLeft, LandBottomMiddle, LandBottomRight],
            &[Water, Rock, LandTopLeft, LandLeftMiddle, LandBottomLeft],
            &[Water, Rock, LandTopLeft, LandTopMiddle, LandTopRight],
            &[Water, Rock, LandTopRight, LandRightMiddle, LandBottomRight],
        ]);

        grammar.set_rules(Rock, [&[Water], &[Water], &[Water], &[Water]]);

        grammar.set_rules(LandTopLeft, [
            &[Water],
            &[LandTopMiddle],
            &[LandLeftMiddle],
            &[Water],
        ]);
        grammar.set_rules(LandTopMiddle, [
            &[Water],
            &[LandTopMiddle, LandTopRight],
            &[LandMiddle],
            &[LandTopLeft, LandTopMiddle],
        ]);
        grammar.set_rules(LandTopRight, [
            &[Water],
            &[Water],
            &[LandRightMiddle],
            &[LandTopMiddle],
        ]);

        grammar.set_rules(LandLeftMiddle, [
            &[LandTopLeft, LandLeftMiddle],
            &[LandMiddle],
            &[LandLeftMiddle, LandBottomLeft],
            &[Water],
        ]);
        grammar.set_rules(LandMiddle, [
            &[LandTopMiddle, LandMiddle],
            &[LandMiddle, LandRightMiddle],
            &[LandMiddle, LandBottomMiddle],
            &[LandLeftMiddle, LandMiddle],
        ]);
        grammar.set_rules(LandRightMiddle, [
            &[LandTopRight, LandRightMiddle],
            &[Water],
            &[LandRightMiddle, LandBottomRight],
            &[LandMiddle],
        ]);

        grammar.set_rules(LandBottomLeft, [
            &[LandLeftMiddle],
            &[LandBottomMiddle],
            &[Water],
            &[Water],
        ]);
        grammar.set_rules(LandBottomMiddle, [
            &[LandMiddle],
            &[LandBottomMiddle, LandBottomRight],
            &[Water],
            &[LandBottomLeft, LandBottomMiddle],
        ]);
        grammar.set_rules(LandBottomRight, [
            &[LandRightMiddle],
            &[Water],
            &[Water],
            &[LandBottomMiddle],
        ]);

        grammar

    }

    /// Set the allowed neighbors of a tile in a single direction.
    pub fn set_rule(&mut self, tile: Tile, dir: Dir, allowed: TileSet) -> &mut Self {
        self.rules[tile.id() as usize][dir.index()] = Some(allowed);
        self
    }

    /// Set the allowed neighbors of a tile in all directions, in [`Dir::ALL`] order.
    pub fn set_rules(&mut self, tile: Tile, allowed: [&[Tile]; 4]) -> &mut Self {
        for dir in Dir::ALL {
            self.set_rule(tile, dir, TileSet::of(allowed[dir.index()]));
        }
        self
    }

    /// The tile types generated with this grammar.
    #[inline]
    pub fn tiles(&self) -> TileSet {
        self.tiles
    }

    /// Get the rule of a tile in a direction, if defined.
    #[inline]
    pub fn rule(&self, tile: Tile, dir: Dir) -> Option<TileSet> {
        self.rules[tile.id() as usize][dir.index()]
    }

    /// Get the tiles allowed next to a tile in a direction, a missing rule allows
    /// nothing.
    #[inline]
    pub fn allowed(&self, tile: Tile, dir: Dir) -> TileSet {
        self.rule(tile, dir).unwrap_or_default()
    }

    /// Get the union of tiles allowed in a direction by any tile of the given set.
    pub fn allowed_by_any(&self, tiles: TileSet, dir: Dir) -> TileSet {
        tiles.iter().fold(TileSet::EMPTY, |acc, tile| acc.union(self.allowed(tile, dir)))
    }

    /// Return true if `neighbor` may be placed next to `tile` in the given direction.
    #[inline]
    pub fn permits(&self, tile: Tile, dir: Dir, neighbor: Tile) -> bool {
        self.allowed(tile, dir).contains(neighbor)
    }

    /// Return true if the tile can sit in a cell with the given neighbors, indexed by
    /// direction, absent neighbors are ignored. This is the plain grammar check used
    /// by the validator.
    pub fn fits(&self, tile: Tile, neighbors: &[Option<Tile>; 4]) -> bool {
        Dir::ALL.into_iter().all(|dir| match neighbors[dir.index()] {
            Some(neighbor) => self.permits(tile, dir, neighbor),
            None => true,
        })
    }

    /// Stricter compatibility check used while placing land: the grammar rule must
    /// exist and permit the neighbor, and some corner pieces additionally exclude
    /// neighbors that would start a coastline facing the wrong way.
    pub fn is_compatible(&self, center: Tile, neighbor: Tile, dir: Dir) -> bool {
        let Some(allowed) = self.rule(center, dir) else {
            return false;
        };
        !corner_exclusions(center, dir).contains(neighbor) && allowed.contains(neighbor)
    }

    /// Return true if the tile may be placed given its already placed neighbors,
    /// indexed by direction. Water and rock are always placeable, land pieces must
    /// be compatible with each placed neighbor.
    pub fn is_valid_placement(&self, tile: Tile, neighbors: &[Option<Tile>; 4]) -> bool {

        if !tile.is_land() {
            return true;
        }

        Dir::ALL.into_iter().all(|dir| match neighbors[dir.index()] {
            Some(neighbor) => self.is_compatible(tile, neighbor, dir),
            None => true,
        })

    }

    /// Check that this grammar can be used for generation: every defined rule must
    /// allow at least one tile, and every rule must be symmetric, if tile A allows B
    /// in a direction then B must allow A in the opposite direction.
    pub fn check(&self) -> Result<(), GrammarError> {

        for tile in self.tiles {
            for dir in Dir::ALL {

                let Some(allowed) = self.rule(tile, dir) else {
                    continue;
                };

                if allowed.is_empty() {
                    return Err(GrammarError::EmptyRule { tile, dir });
                }

                for neighbor in allowed.intersection(self.tiles) {
                    if !self.permits(neighbor, dir.opposite(), tile) {
                        return Err(GrammarError::Asymmetric { tile, dir, neighbor });
                    }
                }

            }
        }

        Ok(())

    }

}


/// Neighbors that a corner piece must never have in a direction, on top of its grammar
/// rule. A bottom right corner for example cannot have interior or left-side land on
/// its right.
fn corner_exclusions(center: Tile, dir: Dir) -> TileSet {

    use Tile::*;

    const LEFT_SIDE: TileSet = TileSet::of(&[LandMiddle, LandLeftMiddle, LandTopLeft, LandBottomLeft]);
    const RIGHT_SIDE: TileSet = TileSet::of(&[LandMiddle, LandRightMiddle, LandTopRight, LandBottomRight]);
    const TOP_SIDE: TileSet = TileSet::of(&[LandMiddle, LandTopMiddle, LandTopLeft, LandTopRight]);
    const BOTTOM_SIDE: TileSet = TileSet::of(&[LandMiddle, LandBottomMiddle, LandBottomLeft, LandBottomRight]);

    match (center, dir) {
        (LandBottomRight, Dir::Right) => LEFT_SIDE,
        (LandBottomRight, Dir::Down) => TOP_SIDE,
        (LandTopLeft, Dir::Left) => RIGHT_SIDE,
        (LandTopLeft, Dir::Up) => BOTTOM_SIDE,
        (LandTopRight, Dir::Right) => LEFT_SIDE,
        (LandBottomLeft, Dir::Left) => RIGHT_SIDE,
        _ => TileSet::EMPTY,
    }

}


/// Error returned when checking a grammar at load time.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    #[error("rule of {tile} toward {dir:?} allows nothing")]
    EmptyRule { tile: Tile, dir: Dir },
    #[error("{tile} allows {neighbor} toward {dir:?} but {neighbor} does not allow {tile} in return")]
    Asymmetric { tile: Tile, dir: Dir, neighbor: Tile },
}
