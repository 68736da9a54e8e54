//! Weighted choice of the concrete tile of a collapsing cell.
//!
//! Plain weights alone scatter single land tiles all over the sea, so after the water
//! and rock draws, land candidates are filtered by the grammar's placement check
//! against already placed neighbors, and interior land is favored next to interior
//! land so that landmasses grow instead of fragmenting.

use crate::config::GenConfig;
use crate::grammar::Grammar;
use crate::tile::{Tile, TileSet};
use crate::util::SeaRandom;


/// Probabilities driving tile selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionPolicy {
    /// Probability of preferring water.
    pub water_probability: f32,
    /// Probability of preferring a rock, when water was not preferred.
    pub rock_probability: f32,
    /// Probability of choosing interior land next to interior land.
    pub land_middle_bias: f32,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::from_config(&GenConfig::default())
    }
}

impl SelectionPolicy {

    pub fn from_config(config: &GenConfig) -> Self {
        Self {
            water_probability: config.water_probability,
            rock_probability: config.rock_probability,
            land_middle_bias: config.land_middle_bias,
        }
    }

    /// Choose a tile among the possibilities of a cell, given its already collapsed
    /// neighbors indexed by direction. The possibility set must not be empty.
    ///
    /// The returned tile is always one of the possibilities, except when the land draw
    /// finds no placeable candidate, in which case water is returned.
    pub fn select(
        &self,
        grammar: &Grammar,
        possible: TileSet,
        neighbors: &[Option<Tile>; 4],
        rand: &mut SeaRandom,
    ) -> Tile {

        debug_assert!(!possible.is_empty(), "cannot select from an empty set");

        if rand.next_chance(self.water_probability) {
            return prefer(Tile::Water, possible, rand);
        }

        if rand.next_chance(self.rock_probability) {
            return prefer(Tile::Rock, possible, rand);
        }

        let placeable = possible.filter(|tile| grammar.is_valid_placement(tile, neighbors));
        if placeable.is_empty() {
            return Tile::Water;
        }

        let middle_neighbor = neighbors.contains(&Some(Tile::LandMiddle));
        if middle_neighbor
            && placeable.contains(Tile::LandMiddle)
            && rand.next_chance(self.land_middle_bias) {
            return Tile::LandMiddle;
        }

        choose(placeable, rand)

    }

}


/// Return the preferred tile if possible, or a uniformly random possibility.
#[inline]
fn prefer(tile: Tile, possible: TileSet, rand: &mut SeaRandom) -> Tile {
    if possible.contains(tile) {
        tile
    } else {
        choose(possible, rand)
    }
}

/// Pick a uniformly random tile of a non-empty set.
pub(crate) fn choose(set: TileSet, rand: &mut SeaRandom) -> Tile {
    let (tiles, len) = set.to_array();
    rand.next_choice(&tiles[..len])
}


#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn always_water_when_certain() {
        let policy = SelectionPolicy { water_probability: 1.0, ..SelectionPolicy::default() };
        let grammar = Grammar::coastline();
        let mut rand = SeaRandom::new(1);
        for _ in 0..100 {
            assert_eq!(policy.select(&grammar, TileSet::FULL, &[None; 4], &mut rand), Tile::Water);
        }
    }

    #[test]
    fn falls_back_inside_possibilities() {
        let policy = SelectionPolicy { water_probability: 1.0, ..SelectionPolicy::default() };
        let grammar = Grammar::coastline();
        let possible = TileSet::of(&[Tile::LandMiddle, Tile::LandTopMiddle]);
        let mut rand = SeaRandom::new(2);
        for _ in 0..100 {
            assert!(possible.contains(policy.select(&grammar, possible, &[None; 4], &mut rand)));
        }
    }

    #[test]
    fn land_draw_respects_neighbors() {

        let policy = SelectionPolicy {
            water_probability: 0.0,
            rock_probability: 0.0,
            land_middle_bias: 0.0,
        };
        let grammar = Grammar::coastline();
        let mut rand = SeaRandom::new(3);

        // With water on the right, only pieces allowing water on their right remain.
        let neighbors = [None, Some(Tile::Water), None, None];
        let possible = TileSet::of(&[Tile::LandTopLeft, Tile::LandTopRight, Tile::LandMiddle]);
        for _ in 0..100 {
            assert_eq!(policy.select(&grammar, possible, &neighbors, &mut rand), Tile::LandTopRight);
        }

        // Nothing placeable, water is the fallback.
        let possible = TileSet::of(&[Tile::LandTopLeft, Tile::LandMiddle]);
        assert_eq!(policy.select(&grammar, possible, &neighbors, &mut rand), Tile::Water);

    }

    #[test]
    fn interior_clusters() {

        let policy = SelectionPolicy {
            water_probability: 0.0,
            rock_probability: 0.0,
            land_middle_bias: 1.0,
        };
        let grammar = Grammar::coastline();
        let mut rand = SeaRandom::new(4);
        let neighbors = [Some(Tile::LandMiddle), None, None, None];
        let possible = TileSet::of(&[Tile::LandMiddle, Tile::LandBottomMiddle]);

        for _ in 0..100 {
            assert_eq!(policy.select(&grammar, possible, &neighbors, &mut rand), Tile::LandMiddle);
        }

    }

}
