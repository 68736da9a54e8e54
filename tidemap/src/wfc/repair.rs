//! Post-generation validation and repair of sections.
//!
//! Sections are collapsed independently, so tiles along a section border can violate
//! the grammar against a section generated earlier. The repairer checks every tile of a
//! section against its four neighbors, looking into neighbor sections when needed, and
//! replaces offending tiles, preferring water.

use glam::IVec2;

use crate::grammar::Grammar;
use crate::section::Section;
use crate::tile::{Tile, TileSet};
use crate::util::{Dir, SeaRandom};

use super::policy::choose;


/// Validates and repairs sections against a grammar.
#[derive(Debug, Clone, Copy)]
pub struct Repairer<'a> {
    grammar: &'a Grammar,
    /// Maximum number of tile changes in a single section.
    max_fixes: u32,
}

impl<'a> Repairer<'a> {

    pub fn new(grammar: &'a Grammar, max_fixes: u32) -> Self {
        Self { grammar, max_fixes }
    }

    /// Get the neighbors of a local cell, indexed by direction. The `origin` is the
    /// world position of the section's local origin, cells outside of the section are
    /// resolved through `outside` with their world position.
    pub fn neighbors<F>(&self, section: &Section, origin: IVec2, x: u32, y: u32, outside: &F) -> [Option<Tile>; 4]
    where
        F: Fn(IVec2) -> Option<Tile>,
    {
        Dir::ALL.map(|dir| {
            let local = IVec2::new(x as i32, y as i32) + dir.delta();
            if section.contains(local.x, local.y) {
                Some(section.get(local.x as u32, local.y as u32))
            } else {
                outside(origin + local)
            }
        })
    }

    /// Get every tile of the grammar that fits between the given neighbors.
    pub fn valid_tiles(&self, neighbors: &[Option<Tile>; 4]) -> TileSet {
        self.grammar.tiles().filter(|tile| self.grammar.fits(tile, neighbors))
    }

    /// Repair the given section and return the number of tiles changed.
    ///
    /// Invalid tiles are replaced by water if water fits, or else by a random fitting
    /// tile, or else by water anyway. Passes over the section are repeated until one
    /// changes nothing or the maximum number of fixes is reached, violations left at
    /// that point are accepted.
    pub fn repair<F>(&self, section: &mut Section, origin: IVec2, outside: F, rand: &mut SeaRandom) -> u32
    where
        F: Fn(IVec2) -> Option<Tile>,
    {

        let size = section.size();
        let mut fixes = 0;

        loop {

            let mut changed = false;

            for y in 0..size {
                for x in 0..size {

                    if fixes >= self.max_fixes {
                        return fixes;
                    }

                    let tile = section.get(x, y);
                    let neighbors = self.neighbors(section, origin, x, y, &outside);
                    if self.grammar.fits(tile, &neighbors) {
                        continue;
                    }

                    let valid = self.valid_tiles(&neighbors);
                    let replacement = if valid.contains(Tile::Water) || valid.is_empty() {
                        Tile::Water
                    } else {
                        choose(valid, rand)
                    };

                    if replacement != tile {
                        section.set(x, y, replacement);
                        fixes += 1;
                        changed = true;
                    }

                }
            }

            if !changed {
                return fixes;
            }

        }

    }

    /// Count the tiles of a section that violate the grammar against their neighbors.
    pub fn count_invalid<F>(&self, section: &Section, origin: IVec2, outside: F) -> usize
    where
        F: Fn(IVec2) -> Option<Tile>,
    {
        let size = section.size();
        let mut invalid = 0;
        for y in 0..size {
            for x in 0..size {
                let neighbors = self.neighbors(section, origin, x, y, &outside);
                if !self.grammar.fits(section.get(x, y), &neighbors) {
                    invalid += 1;
                }
            }
        }
        invalid
    }

}


#[cfg(test)]
mod tests {

    use super::*;
    use crate::wfc::Solver;

    /// Lookup for a 3x3 section at the origin with an all water section on its right.
    fn water_on_right(pos: IVec2) -> Option<Tile> {
        (pos.x >= 3 && pos.x < 6 && pos.y >= 0 && pos.y < 3).then_some(Tile::Water)
    }

    #[test]
    fn rigged_corner_replaced_by_water() {

        let grammar = Grammar::coastline();
        let mut solver = Solver::new(&grammar, 3, 3);
        solver.restrict(2, 1, TileSet::single(Tile::LandTopLeft));
        let mut section = Section::from_tiles(3, solver.collapse(&mut SeaRandom::new(8)));
        assert_eq!(section.get(2, 1), Tile::LandTopLeft);

        let repairer = Repairer::new(&grammar, 50);
        let fixes = repairer.repair(&mut section, IVec2::ZERO, water_on_right, &mut SeaRandom::new(9));

        assert!(fixes >= 1);
        assert_eq!(section.get(2, 1), Tile::Water);
        assert_eq!(repairer.count_invalid(&section, IVec2::ZERO, water_on_right), 0);

    }

    #[test]
    fn isolated_section_fully_repaired() {
        let grammar = Grammar::coastline();
        let repairer = Repairer::new(&grammar, u32::MAX);
        for seed in 0..6 {
            let tiles = Solver::new(&grammar, 12, 12).collapse(&mut SeaRandom::new(seed));
            let mut section = Section::from_tiles(12, tiles);
            repairer.repair(&mut section, IVec2::ZERO, |_| None, &mut SeaRandom::new(seed));
            assert_eq!(repairer.count_invalid(&section, IVec2::ZERO, |_| None), 0);
        }
    }

    #[test]
    fn fix_cap_is_respected() {

        let grammar = Grammar::coastline();
        let repairer = Repairer::new(&grammar, 3);

        // A checkerboard of water and interior land is invalid almost everywhere.
        let tiles = (0..64)
            .map(|i| if (i % 8 + i / 8) % 2 == 0 { Tile::Water } else { Tile::LandMiddle })
            .collect();
        let mut section = Section::from_tiles(8, tiles);

        let fixes = repairer.repair(&mut section, IVec2::ZERO, |_| None, &mut SeaRandom::new(1));
        assert_eq!(fixes, 3);
        assert!(repairer.count_invalid(&section, IVec2::ZERO, |_| None) > 0);

    }

    #[test]
    fn valid_section_untouched() {
        let grammar = Grammar::coastline();
        let repairer = Repairer::new(&grammar, 50);
        let mut section = Section::new(5);
        section.set(2, 2, Tile::Rock);
        let before = section.clone();
        assert_eq!(repairer.repair(&mut section, IVec2::ZERO, |_| Some(Tile::Water), &mut SeaRandom::new(1)), 0);
        assert_eq!(section, before);
    }

}
