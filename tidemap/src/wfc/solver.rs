//! Wave function collapse solver over a rectangular grid.
//!
//! Each cell starts with the full tile set of the grammar as its possibilities. The
//! solver repeatedly collapses one of the lowest entropy cells to a concrete tile and
//! propagates the constraint of that tile to its neighbors, transitively.
//!
//! Contradictions are absorbed, never returned: a neighbor whose possibilities become
//! empty during propagation is forced to water, and a grid where an empty cell is
//! selected is restarted from scratch, up to a maximum number of restarts after which
//! the whole grid falls back to water.

use tracing::{trace, warn};

use crate::grammar::Grammar;
use crate::tile::{Tile, TileSet};
use crate::util::{Dir, SeaRandom};

use super::policy::SelectionPolicy;


/// Default number of restarts, see [`Solver::with_max_restarts`].
pub const DEFAULT_MAX_RESTARTS: u32 = 8;


/// Counters describing how a collapse went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollapseStats {
    /// Number of selection iterations run, across all restarts.
    pub iterations: u32,
    /// Number of full grid restarts.
    pub restarts: u32,
    /// Number of cells forced to water during propagation.
    pub contradictions: u32,
    /// Number of cells still uncollapsed when the iteration budget ran out, these were
    /// filled with water.
    pub unresolved: u32,
    /// True when restarts were exhausted and the grid fell back to water.
    pub fallback: bool,
}


/// The solver for a single grid, it can be collapsed once.
pub struct Solver<'a> {
    grammar: &'a Grammar,
    policy: SelectionPolicy,
    width: u32,
    height: u32,
    max_restarts: u32,
    /// Possibilities each cell starts from, restored on restart.
    initial: Vec<TileSet>,
    /// Current possibilities of each cell, a collapsed cell holds its single tile.
    possible: Vec<TileSet>,
    /// Collapsed tile of each cell.
    collapsed: Vec<Option<Tile>>,
    /// Reused propagation work stack.
    stack: Vec<usize>,
    /// Reused candidates for the lowest entropy.
    candidates: Vec<usize>,
    stats: CollapseStats,
}

impl<'a> Solver<'a> {

    /// Create a solver for a grid of the given size, where every cell may be any tile
    /// of the grammar.
    pub fn new(grammar: &'a Grammar, width: u32, height: u32) -> Self {
        let len = (width * height) as usize;
        Self {
            grammar,
            policy: SelectionPolicy::default(),
            width,
            height,
            max_restarts: DEFAULT_MAX_RESTARTS,
            initial: vec![grammar.tiles(); len],
            possible: vec![grammar.tiles(); len],
            collapsed: vec![None; len],
            stack: Vec::new(),
            candidates: Vec::new(),
            stats: CollapseStats::default(),
        }
    }

    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the number of full restarts allowed before falling back to an all water
    /// grid.
    pub fn with_max_restarts(mut self, max_restarts: u32) -> Self {
        self.max_restarts = max_restarts;
        self
    }

    /// Restrict the starting possibilities of a cell, the restriction survives
    /// restarts. An empty restriction makes the grid unsatisfiable.
    pub fn restrict(&mut self, x: u32, y: u32, tiles: TileSet) {
        let index = self.index(x, y);
        self.initial[index] = self.initial[index].intersection(tiles);
        self.possible[index] = self.initial[index];
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        (y * self.width + x) as usize
    }

    /// Get the index of the neighbor of a cell in a direction, if inside the grid.
    #[inline]
    fn neighbor(&self, index: usize, dir: Dir) -> Option<usize> {
        let x = (index % self.width as usize) as i32;
        let y = (index / self.width as usize) as i32;
        let n = glam::IVec2::new(x, y) + dir.delta();
        if n.x < 0 || n.y < 0 || n.x >= self.width as i32 || n.y >= self.height as i32 {
            None
        } else {
            Some(n.y as usize * self.width as usize + n.x as usize)
        }
    }

    /// Get the collapsed neighbors of a cell, indexed by direction.
    fn collapsed_neighbors(&self, index: usize) -> [Option<Tile>; 4] {
        Dir::ALL.map(|dir| self.neighbor(index, dir).and_then(|n| self.collapsed[n]))
    }

    fn reset(&mut self) {
        self.possible.copy_from_slice(&self.initial);
        self.collapsed.fill(None);
    }

    /// Collapse the whole grid and return its tiles row by row, every cell holds a
    /// concrete tile.
    pub fn collapse(self, rand: &mut SeaRandom) -> Vec<Tile> {
        self.collapse_with_stats(rand).0
    }

    /// Same as [`Self::collapse`] but also return collapse statistics.
    pub fn collapse_with_stats(mut self, rand: &mut SeaRandom) -> (Vec<Tile>, CollapseStats) {

        let max_iterations = self.width * self.height * 10;

        while self.stats.iterations < max_iterations {

            self.stats.iterations += 1;

            let Some(entropy) = self.find_candidates() else {
                break;
            };

            let chosen = self.candidates[rand.next_int_bounded(self.candidates.len() as i32) as usize];

            if entropy == 0 {

                if self.stats.restarts >= self.max_restarts {
                    warn!(restarts = self.stats.restarts, "restarts exhausted, falling back to water");
                    self.stats.fallback = true;
                    let len = self.collapsed.len();
                    return (vec![Tile::Water; len], self.stats);
                }

                trace!(cell = chosen, "empty cell selected, restarting grid");
                self.stats.restarts += 1;
                self.reset();
                continue;

            }

            let neighbors = self.collapsed_neighbors(chosen);
            let tile = self.policy.select(self.grammar, self.possible[chosen], &neighbors, rand);

            self.collapsed[chosen] = Some(tile);
            self.possible[chosen] = TileSet::single(tile);
            self.propagate(chosen);

        }

        let mut unresolved = 0;
        let tiles = self.collapsed.iter()
            .map(|tile| tile.unwrap_or_else(|| {
                unresolved += 1;
                Tile::Water
            }))
            .collect();

        self.stats.unresolved = unresolved;
        (tiles, self.stats)

    }

    /// Fill the candidates with every uncollapsed cell of the lowest entropy and
    /// return that entropy, or none if every cell is collapsed.
    ///
    /// Empty cells are candidates too, at entropy zero, so that selecting one restarts
    /// the grid. Propagation never leaves a cell empty, only an empty restriction can.
    fn find_candidates(&mut self) -> Option<usize> {

        let mut min_entropy = usize::MAX;
        self.candidates.clear();

        for (index, (tile, possible)) in self.collapsed.iter().zip(&self.possible).enumerate() {
            if tile.is_none() {
                let entropy = possible.len();
                if entropy < min_entropy {
                    min_entropy = entropy;
                    self.candidates.clear();
                    self.candidates.push(index);
                } else if entropy == min_entropy {
                    self.candidates.push(index);
                }
            }
        }

        (!self.candidates.is_empty()).then_some(min_entropy)

    }

    /// Propagate constraints from the given cell through the grid.
    fn propagate(&mut self, start: usize) {

        self.stack.clear();
        self.stack.push(start);

        while let Some(current) = self.stack.pop() {

            let current_possible = self.possible[current];

            for dir in Dir::ALL {

                let Some(neighbor) = self.neighbor(current, dir) else {
                    continue;
                };

                if self.collapsed[neighbor].is_some() {
                    continue;
                }

                let before = self.possible[neighbor];
                let allowed = self.grammar.allowed_by_any(current_possible, dir);
                let placed = self.collapsed_neighbors(neighbor);

                let mut after = before.intersection(allowed)
                    .filter(|tile| self.grammar.is_valid_placement(tile, &placed));

                if after.is_empty() {
                    after = TileSet::single(Tile::Water);
                    if before != after {
                        self.stats.contradictions += 1;
                    }
                }

                if after != before {
                    self.possible[neighbor] = after;
                    self.stack.push(neighbor);
                }

            }

        }

    }

}


#[cfg(test)]
mod tests {

    use super::*;

    fn grid_fits(grammar: &Grammar, tiles: &[Tile], width: u32, height: u32) -> usize {
        let mut violations = 0;
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                let tile = tiles[(y * width as i32 + x) as usize];
                for dir in Dir::ALL {
                    let n = glam::IVec2::new(x, y) + dir.delta();
                    if n.x >= 0 && n.y >= 0 && n.x < width as i32 && n.y < height as i32 {
                        let neighbor = tiles[(n.y * width as i32 + n.x) as usize];
                        if !grammar.permits(tile, dir, neighbor) {
                            violations += 1;
                        }
                    }
                }
            }
        }
        violations
    }

    #[test]
    fn every_cell_collapsed() {
        let grammar = Grammar::coastline();
        for (width, height, seed) in [(1, 1, 0), (1, 7, 1), (5, 3, 2), (16, 16, 3), (40, 25, 4)] {
            let mut rand = SeaRandom::new(seed);
            let (tiles, stats) = Solver::new(&grammar, width, height).collapse_with_stats(&mut rand);
            assert_eq!(tiles.len(), (width * height) as usize);
            assert_eq!(stats.unresolved, 0);
            assert!(!stats.fallback);
        }
    }

    #[test]
    fn same_seed_same_grid() {
        let grammar = Grammar::coastline();
        let a = Solver::new(&grammar, 20, 20).collapse(&mut SeaRandom::new(99));
        let b = Solver::new(&grammar, 20, 20).collapse(&mut SeaRandom::new(99));
        assert_eq!(a, b);
    }

    #[test]
    fn two_tiles_never_mix() {

        let mut grammar = Grammar::new(TileSet::of(&[Tile::Water, Tile::LandMiddle]));
        let water: &[Tile] = &[Tile::Water];
        let land: &[Tile] = &[Tile::LandMiddle];
        grammar.set_rules(Tile::Water, [water; 4]);
        grammar.set_rules(Tile::LandMiddle, [land; 4]);
        assert_eq!(grammar.check(), Ok(()));

        for seed in 0..8 {
            let mut rand = SeaRandom::new(seed);
            let tiles = Solver::new(&grammar, 10, 10).collapse(&mut rand);
            assert!(tiles.iter().all(|&t| t == Tile::Water || t == Tile::LandMiddle));
            assert_eq!(grid_fits(&grammar, &tiles, 10, 10), 0);
        }

    }

    #[test]
    fn rigged_cell_is_honored() {
        let grammar = Grammar::coastline();
        let mut solver = Solver::new(&grammar, 3, 3);
        solver.restrict(2, 1, TileSet::single(Tile::LandTopLeft));
        let tiles = solver.collapse(&mut SeaRandom::new(5));
        assert_eq!(tiles[1 * 3 + 2], Tile::LandTopLeft);
        assert_eq!(tiles[0 * 3 + 2], Tile::Water);
        assert_eq!(tiles[2 * 3 + 2], Tile::LandLeftMiddle);
    }

    #[test]
    fn unsatisfiable_grid_falls_back_to_water() {
        let grammar = Grammar::coastline();
        let mut solver = Solver::new(&grammar, 4, 4).with_max_restarts(3);
        solver.restrict(1, 1, TileSet::EMPTY);
        let (tiles, stats) = solver.collapse_with_stats(&mut SeaRandom::new(6));
        assert!(stats.fallback);
        assert_eq!(stats.restarts, 3);
        assert!(tiles.iter().all(|&t| t == Tile::Water));
    }

    #[test]
    fn exhausted_budget_leaves_water() {
        let grammar = Grammar::coastline();
        let mut solver = Solver::new(&grammar, 4, 4).with_max_restarts(u32::MAX);
        solver.restrict(2, 3, TileSet::EMPTY);
        let (tiles, stats) = solver.collapse_with_stats(&mut SeaRandom::new(7));
        assert!(!stats.fallback);
        assert_eq!(stats.iterations, 4 * 4 * 10);
        assert_eq!(stats.unresolved, 4 * 4);
        assert!(tiles.iter().all(|&t| t == Tile::Water));
    }

    #[test]
    fn land_appears_on_large_grid() {
        let grammar = Grammar::coastline();
        let tiles = Solver::new(&grammar, 30, 30).collapse(&mut SeaRandom::new(12));
        assert!(tiles.iter().any(|t| t.is_land()));
        assert!(tiles.iter().filter(|&&t| t == Tile::Water).count() > tiles.len() / 10);
    }

}
