//! Section generation through wave function collapse.
//!
//! Generation of a section never depends on other sections, a section is only derived
//! from the world seed and its coordinates. Seams between sections are fixed afterward
//! by the [`Repairer`], once the section is about to join the world.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::GenConfig;
use crate::grammar::Grammar;
use crate::section::Section;
use crate::util::SeaRandom;

mod policy;
pub use policy::SelectionPolicy;

mod solver;
pub use solver::{Solver, CollapseStats, DEFAULT_MAX_RESTARTS};

mod repair;
pub use repair::Repairer;


/// A trait for generators of section terrain, shared between the world and
/// background workers.
pub trait SectionGenerator {

    /// Side length of the generated sections.
    fn size(&self) -> u32;

    /// Generate the tiles of the given section, without any knowledge of its
    /// neighbors.
    fn generate(&self, sx: i32, sy: i32) -> GeneratedSection;

}

/// A freshly generated section, not yet validated against its neighbors.
#[derive(Debug, Clone)]
pub struct GeneratedSection {
    pub section: Section,
    pub stats: CollapseStats,
}


/// The wave function collapse section generator.
#[derive(Debug, Clone)]
pub struct WfcGenerator {
    grammar: Arc<Grammar>,
    policy: SelectionPolicy,
    seed: i64,
    size: u32,
    max_restarts: u32,
}

impl WfcGenerator {

    pub fn new(grammar: Arc<Grammar>, config: &GenConfig) -> Self {
        Self {
            grammar,
            policy: SelectionPolicy::from_config(config),
            seed: config.seed,
            size: config.section_size,
            max_restarts: config.max_restarts,
        }
    }

    #[inline]
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

}

impl SectionGenerator for WfcGenerator {

    fn size(&self) -> u32 {
        self.size
    }

    fn generate(&self, sx: i32, sy: i32) -> GeneratedSection {

        let mut rand = SeaRandom::for_section(self.seed, sx, sy);
        let (tiles, stats) = Solver::new(&self.grammar, self.size, self.size)
            .with_policy(self.policy)
            .with_max_restarts(self.max_restarts)
            .collapse_with_stats(&mut rand);

        if stats.fallback {
            warn!(sx, sy, restarts = stats.restarts, "section fell back to water");
        } else {
            debug!(sx, sy, iterations = stats.iterations, restarts = stats.restarts,
                contradictions = stats.contradictions, "section collapsed");
        }

        GeneratedSection {
            section: Section::from_tiles(self.size, tiles),
            stats,
        }

    }

}
