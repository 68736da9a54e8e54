//! The world state, owning every published section and driving their generation as the
//! player moves around.
//!
//! A section is published in the section index only once it has been validated against
//! its already published neighbors, so readers never observe a raw section. Sections
//! are never regenerated or evicted once published.

use std::mem;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use glam::{IVec2, Vec2};
use indexmap::IndexMap;

use tracing::{debug, info, instrument, warn};

use crate::config::{ConfigError, GenConfig};
use crate::grammar::{Grammar, GrammarError};
use crate::section::{calc_local_pos, calc_section_pos, calc_tile_center, calc_tile_pos, calc_world_pos, Section};
use crate::storage::SectionStorage;
use crate::tile::Tile;
use crate::util::SeaRandom;
use crate::wfc::{GeneratedSection, Repairer, SectionGenerator, WfcGenerator};


/// Salt applied to the world seed for the random generator used by repair and coin
/// scattering, so that it does not replay the collapse sequence.
const DECORATE_SALT: i64 = 0x2F6B1A3C9D;


/// Data structure for a whole world of sections, with its section index, collectible
/// coins and optional background generation storage.
pub struct WorldState {
    /// The configuration this world has been created with.
    config: GenConfig,
    /// The generator shared with background workers.
    generator: Arc<WfcGenerator>,
    /// Published sections, mapped to their coordinates.
    sections: IndexMap<(i32, i32), Arc<Section>>,
    /// Coins not yet collected.
    coins: Vec<Coin>,
    /// Optional background generation, sections are generated synchronously if none.
    storage: Option<SectionStorage>,
    /// Next events to be processed, if enabled.
    events: Option<Vec<Event>>,
}

impl WorldState {

    /// Create a new world with the coastline grammar.
    pub fn new(config: GenConfig) -> Result<Self, WorldError> {
        Self::with_grammar(config, Grammar::coastline())
    }

    /// Create a new world generating with the given grammar, both the configuration
    /// and the grammar are checked first.
    pub fn with_grammar(config: GenConfig, grammar: Grammar) -> Result<Self, WorldError> {

        config.validate()?;
        grammar.check()?;

        let generator = Arc::new(WfcGenerator::new(Arc::new(grammar), &config));

        Ok(Self {
            config,
            generator,
            sections: IndexMap::new(),
            coins: Vec::new(),
            storage: None,
            events: None,
        })

    }

    #[inline]
    pub fn config(&self) -> &GenConfig {
        &self.config
    }

    #[inline]
    pub fn grammar(&self) -> &Grammar {
        self.generator.grammar()
    }

    /// Start background generation with the given number of workers, from now on
    /// sections requested by [`Self::check_section_generation`] are generated by
    /// workers and published on [`Self::tick`].
    pub fn attach_storage(&mut self, workers: usize) -> Result<(), WorldError> {
        let storage = SectionStorage::new(Arc::clone(&self.generator), workers)?;
        self.storage = Some(storage);
        info!(workers, "background section generation started");
        Ok(())
    }

    /// Return true if sections are generated in background.
    #[inline]
    pub fn has_storage(&self) -> bool {
        self.storage.is_some()
    }

    // =================== //
    //        EVENTS       //
    // =================== //

    /// Swap the events queue, the previous queue is returned. Events are only pushed
    /// while a queue is present.
    pub fn swap_events(&mut self, events: Option<Vec<Event>>) -> Option<Vec<Event>> {
        mem::replace(&mut self.events, events)
    }

    #[inline]
    fn push_event(&mut self, event: Event) {
        if let Some(events) = &mut self.events {
            events.push(event);
        }
    }

    // =================== //
    //       SECTIONS      //
    // =================== //

    /// Return true if the given section is published.
    #[inline]
    pub fn contains_section(&self, sx: i32, sy: i32) -> bool {
        self.sections.contains_key(&(sx, sy))
    }

    /// Get a published section.
    #[inline]
    pub fn get_section(&self, sx: i32, sy: i32) -> Option<&Section> {
        self.sections.get(&(sx, sy)).map(|section| &**section)
    }

    /// Get a shared handle to a published section, that can be kept by a renderer.
    #[inline]
    pub fn get_section_shared(&self, sx: i32, sy: i32) -> Option<Arc<Section>> {
        self.sections.get(&(sx, sy)).cloned()
    }

    /// Insert a section as-is, without generation or validation, and return the
    /// previous one. Panics if the section has not the configured size.
    pub fn insert_section(&mut self, sx: i32, sy: i32, section: Section) -> Option<Arc<Section>> {
        assert_eq!(section.size(), self.config.section_size, "section size mismatch");
        self.sections.insert((sx, sy), Arc::new(section))
    }

    /// Number of published sections.
    #[inline]
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Iterate over all published sections, in publication order.
    #[inline]
    pub fn iter_sections(&self) -> SectionsIter<'_> {
        SectionsIter { inner: self.sections.iter() }
    }

    /// Get the generation state of a section.
    pub fn section_state(&self, sx: i32, sy: i32) -> SectionState {
        if self.contains_section(sx, sy) {
            SectionState::Ready
        } else if self.storage.as_ref().is_some_and(|storage| storage.is_pending(sx, sy)) {
            SectionState::Pending
        } else {
            SectionState::Absent
        }
    }

    // =================== //
    //        TILES        //
    // =================== //

    /// Get the tile at the given world tile position, none is returned if the owning
    /// section has not been published yet.
    #[inline]
    pub fn get_tile_at(&self, pos: IVec2) -> Option<Tile> {
        lookup_tile(&self.sections, self.config.section_size, pos)
    }

    /// Get the tile under a continuous world position.
    #[inline]
    pub fn get_tile_at_world(&self, pos: Vec2) -> Option<Tile> {
        self.get_tile_at(calc_tile_pos(pos, self.config.tile_size))
    }

    /// Set the tile at the given world tile position and return the previous one, none
    /// is returned and nothing is set if the owning section is not published.
    pub fn set_tile_at(&mut self, pos: IVec2, tile: Tile) -> Option<Tile> {
        let size = self.config.section_size;
        let (sx, sy) = calc_section_pos(pos, size);
        let (lx, ly) = calc_local_pos(pos, size);
        let section = self.sections.get_mut(&(sx, sy))?;
        Some(Arc::make_mut(section).set(lx, ly, tile))
    }

    // =================== //
    //      GENERATION     //
    // =================== //

    /// Generate, validate and publish the given section right now, nothing is done if
    /// the section is already published. Returns true if the section has been
    /// generated by this call.
    #[instrument(level = "debug", skip(self))]
    pub fn generate_section(&mut self, sx: i32, sy: i32) -> bool {

        if self.contains_section(sx, sy) {
            return false;
        }

        let generated = self.generator.generate(sx, sy);
        self.publish(sx, sy, generated);
        true

    }

    /// Request a section to be generated, synchronously if no storage is attached or
    /// in background otherwise.
    pub fn request_section(&mut self, sx: i32, sy: i32) {
        if self.contains_section(sx, sy) {
            return;
        }
        match &mut self.storage {
            Some(storage) => {
                storage.request(sx, sy);
            }
            None => {
                self.generate_section(sx, sy);
            }
        }
    }

    /// Validate a raw section against its published neighbors, decorate it with coins
    /// and finally publish it.
    fn publish(&mut self, sx: i32, sy: i32, generated: GeneratedSection) {

        let size = self.config.section_size;
        let origin = calc_world_pos(sx, sy, 0, 0, size);
        let mut section = generated.section;
        let mut rand = SeaRandom::for_section(self.config.seed ^ DECORATE_SALT, sx, sy);

        let repairer = Repairer::new(self.generator.grammar(), self.config.max_fixes);
        let sections = &self.sections;
        let fixes = repairer.repair(&mut section, origin, |pos| lookup_tile(sections, size, pos), &mut rand);

        if fixes > 0 {
            debug!(sx, sy, fixes, "section repaired against its neighbors");
        }

        let coins_before = self.coins.len();
        for ly in 0..size {
            for lx in 0..size {
                if section.get(lx, ly) == Tile::Water && rand.next_chance(self.config.coin_chance) {
                    let pos = calc_tile_center(calc_world_pos(sx, sy, lx, ly, size), self.config.tile_size);
                    self.coins.push(Coin { pos });
                }
            }
        }
        let coins = self.coins.len() - coins_before;

        self.sections.insert((sx, sy), Arc::new(section));
        self.push_event(Event::SectionGenerated { sx, sy, fallback: generated.stats.fallback, coins });
        if fixes > 0 {
            self.push_event(Event::SectionRepaired { sx, sy, fixes });
        }

    }

    /// Validate and repair an already published section against its neighbors, this
    /// is useful after sections have been inserted around it. Returns the number of
    /// tiles fixed, or none if the section is not published.
    pub fn validate_and_fix(&mut self, sx: i32, sy: i32) -> Option<u32> {

        let size = self.config.section_size;
        let mut section = Section::clone(self.sections.get(&(sx, sy))?);
        let mut rand = SeaRandom::for_section(self.config.seed ^ DECORATE_SALT, sx, sy);

        let repairer = Repairer::new(self.generator.grammar(), self.config.max_fixes);
        let sections = &self.sections;
        let origin = calc_world_pos(sx, sy, 0, 0, size);
        let fixes = repairer.repair(&mut section, origin, |pos| lookup_tile(sections, size, pos), &mut rand);

        if fixes > 0 {
            debug!(sx, sy, fixes, "section repaired against its neighbors");
            self.sections.insert((sx, sy), Arc::new(section));
            self.push_event(Event::SectionRepaired { sx, sy, fixes });
        }

        Some(fixes)

    }

    /// Called with the player position on every tick, request generation of the
    /// section under the player and of the neighbor sections, orthogonal and diagonal,
    /// whose border is closer than the edge threshold.
    pub fn check_section_generation(&mut self, pos: Vec2) {

        let size = self.config.section_size;
        let tile_pos = calc_tile_pos(pos, self.config.tile_size);
        let (sx, sy) = calc_section_pos(tile_pos, size);
        let (lx, ly) = calc_local_pos(tile_pos, size);

        let threshold = self.config.edge_threshold;
        let side = |local: u32| -> i32 {
            if local < threshold {
                -1
            } else if local >= size - threshold {
                1
            } else {
                0
            }
        };

        let dx = side(lx);
        let dy = side(ly);

        self.request_section(sx, sy);
        if dx != 0 {
            self.request_section(sx + dx, sy);
        }
        if dy != 0 {
            self.request_section(sx, sy + dy);
        }
        if dx != 0 && dy != 0 {
            self.request_section(sx + dx, sy + dy);
        }

    }

    /// Poll sections generated in background and publish them, at most the configured
    /// number per call. Returns the number of sections published.
    pub fn tick(&mut self) -> usize {

        let mut published = 0;

        while published < self.config.max_publish_per_tick {

            let Some(reply) = self.storage.as_mut().and_then(SectionStorage::poll) else {
                break;
            };

            // The section may have been generated synchronously in the meantime.
            if self.contains_section(reply.sx, reply.sy) {
                continue;
            }

            self.publish(reply.sx, reply.sy, reply.generated);
            published += 1;

        }

        published

    }

    /// Number of sections being generated in background.
    pub fn pending_count(&self) -> usize {
        self.storage.as_ref().map_or(0, SectionStorage::pending_count)
    }

    /// Average duration of background section generation, if any section has been
    /// generated in background.
    pub fn average_generation_duration(&self) -> Option<Duration> {
        self.storage.as_ref().and_then(SectionStorage::average_duration)
    }

    /// Force every tile within the spawn radius of the given position to water, every
    /// section overlapping that area is generated first. Returns the number of tiles
    /// changed.
    pub fn ensure_spawn_is_water(&mut self, pos: Vec2) -> usize {

        let size = self.config.section_size;
        let center = calc_tile_pos(pos, self.config.tile_size);
        let radius = self.config.spawn_radius as i32;
        let mut patched = 0;

        let (min_sx, min_sy) = calc_section_pos(center - IVec2::splat(radius), size);
        let (max_sx, max_sy) = calc_section_pos(center + IVec2::splat(radius), size);
        for sy in min_sy..=max_sy {
            for sx in min_sx..=max_sx {
                self.generate_section(sx, sy);
            }
        }

        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let prev = self.set_tile_at(center + IVec2::new(dx, dy), Tile::Water);
                if prev.is_some_and(|prev| prev != Tile::Water) {
                    patched += 1;
                }
            }
        }

        info!(x = center.x, y = center.y, radius, patched, "spawn area forced to water");
        self.push_event(Event::SpawnPatched { pos: center, patched });
        patched

    }

    /// Generate the 3x3 sections around the spawn position, make the spawn area safe
    /// and audit the result.
    pub fn init_around(&mut self, spawn: Vec2) -> AuditReport {

        let (sx, sy) = calc_section_pos(calc_tile_pos(spawn, self.config.tile_size), self.config.section_size);
        for dy in -1..=1 {
            for dx in -1..=1 {
                self.generate_section(sx + dx, sy + dy);
            }
        }

        self.ensure_spawn_is_water(spawn);
        self.audit()

    }

    /// Count grammar violations over all published sections.
    pub fn audit(&self) -> AuditReport {

        let size = self.config.section_size;
        let repairer = Repairer::new(self.generator.grammar(), self.config.max_fixes);
        let mut report = AuditReport::default();

        for (&(sx, sy), section) in &self.sections {
            let origin = calc_world_pos(sx, sy, 0, 0, size);
            report.total += section.tiles().len();
            report.invalid += repairer.count_invalid(section, origin, |pos| lookup_tile(&self.sections, size, pos));
        }

        let valid_percent = report.valid_ratio() * 100.0;
        if report.invalid == 0 {
            info!(total = report.total, "all tiles are valid");
        } else {
            warn!(total = report.total, invalid = report.invalid, "{valid_percent:.2}% of tiles are valid");
        }

        report

    }

    // =================== //
    //        COINS        //
    // =================== //

    /// Coins not yet collected.
    #[inline]
    pub fn coins(&self) -> &[Coin] {
        &self.coins
    }

    /// Collect every coin within the given radius of the position, they are removed
    /// from the world and their count is returned.
    pub fn collect_coins(&mut self, pos: Vec2, radius: f32) -> usize {
        let before = self.coins.len();
        let radius_squared = radius * radius;
        self.coins.retain(|coin| coin.pos.distance_squared(pos) > radius_squared);
        before - self.coins.len()
    }

}


/// Internal function to get a tile from the section index.
#[inline]
fn lookup_tile(sections: &IndexMap<(i32, i32), Arc<Section>>, size: u32, pos: IVec2) -> Option<Tile> {
    let (sx, sy) = calc_section_pos(pos, size);
    let (lx, ly) = calc_local_pos(pos, size);
    sections.get(&(sx, sy)).map(|section| section.get(lx, ly))
}


/// Generation state of a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionState {
    /// The section has not been requested.
    Absent,
    /// The section is being generated in background.
    Pending,
    /// The section is published, it will never change state again.
    Ready,
}

/// A collectible coin floating on a water tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coin {
    /// World position of the coin, the center of its tile.
    pub pos: Vec2,
}

/// Result of a world audit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditReport {
    /// Total number of tiles audited.
    pub total: usize,
    /// Number of tiles violating the grammar against a neighbor.
    pub invalid: usize,
}

impl AuditReport {

    /// Fraction of valid tiles, one if nothing has been audited.
    pub fn valid_ratio(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            (self.total - self.invalid) as f32 / self.total as f32
        }
    }

}

/// An event that happened in the world.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A section has been published.
    SectionGenerated {
        sx: i32,
        sy: i32,
        /// True if restarts were exhausted and the section is only water.
        fallback: bool,
        /// Number of coins scattered on the section.
        coins: usize,
    },
    /// Tiles of a section have been changed to match its neighbors.
    SectionRepaired {
        sx: i32,
        sy: i32,
        fixes: u32,
    },
    /// The spawn area has been forced to water.
    SpawnPatched {
        /// Center tile of the patch.
        pos: IVec2,
        /// Number of tiles actually changed.
        patched: usize,
    },
}

/// An iterator over published sections.
pub struct SectionsIter<'a> {
    inner: indexmap::map::Iter<'a, (i32, i32), Arc<Section>>,
}

impl<'a> Iterator for SectionsIter<'a> {

    type Item = ((i32, i32), &'a Section);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(&pos, section)| (pos, &**section))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }

}

/// Error returned when creating a world.
#[derive(thiserror::Error, Debug)]
pub enum WorldError {
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid grammar: {0}")]
    Grammar(#[from] GrammarError),
    #[error("failed to start section workers: {0}")]
    Io(#[from] io::Error),
}


#[cfg(test)]
mod tests {

    use std::time::{Duration, Instant};

    use super::*;

    fn small_config(seed: i64) -> GenConfig {
        GenConfig {
            section_size: 16,
            tile_size: 1.0,
            edge_threshold: 4,
            ..GenConfig::with_seed(seed)
        }
    }

    #[test]
    fn generation_is_idempotent() {
        let mut world = WorldState::new(small_config(1)).unwrap();
        assert!(world.generate_section(0, 0));
        let before = world.get_section(0, 0).unwrap().clone();
        let coins = world.coins().len();
        assert!(!world.generate_section(0, 0));
        assert_eq!(world.get_section(0, 0).unwrap(), &before);
        assert_eq!(world.coins().len(), coins);
        assert_eq!(world.section_count(), 1);
        assert_eq!(world.iter_sections().map(|(pos, _)| pos).collect::<Vec<_>>(), [(0, 0)]);
        assert_eq!(*world.get_section_shared(0, 0).unwrap(), before);
    }

    #[test]
    fn absent_tiles_are_none() {
        let mut world = WorldState::new(small_config(2)).unwrap();
        assert_eq!(world.get_tile_at(IVec2::new(5, 5)), None);
        assert_eq!(world.section_state(0, 0), SectionState::Absent);
        world.generate_section(0, 0);
        assert_eq!(world.section_state(0, 0), SectionState::Ready);
        assert!(world.get_tile_at(IVec2::new(5, 5)).is_some());
        assert_eq!(world.get_tile_at_world(Vec2::new(5.9, 5.1)), world.get_tile_at(IVec2::new(5, 5)));
        assert_eq!(world.get_tile_at(IVec2::new(-1, 5)), None);
        assert_eq!(world.get_tile_at(IVec2::new(16, 5)), None);
    }

    #[test]
    fn spawn_is_water() {
        for seed in 0..4 {
            let mut world = WorldState::new(small_config(seed)).unwrap();
            world.swap_events(Some(Vec::new()));
            // Spawn on a section corner, the patch spans four sections.
            let spawn = Vec2::new(0.5, 0.5);
            let report = world.init_around(spawn);
            assert_eq!(world.section_count(), 9);
            assert_eq!(report.total, 9 * 16 * 16);
            for dy in -2..=2 {
                for dx in -2..=2 {
                    assert_eq!(world.get_tile_at(IVec2::new(dx, dy)), Some(Tile::Water));
                }
            }
            let events = world.swap_events(None).unwrap();
            assert!(events.iter().any(|event| matches!(event, Event::SpawnPatched { pos, .. } if *pos == IVec2::ZERO)));
            assert_eq!(events.iter().filter(|event| matches!(event, Event::SectionGenerated { .. })).count(), 9);
        }
    }

    #[test]
    fn spawn_is_water_with_tiny_sections() {
        let config = GenConfig { section_size: 1, edge_threshold: 0, ..small_config(8) };
        assert_eq!(config.validate(), Ok(()));
        let mut world = WorldState::new(config).unwrap();
        world.init_around(Vec2::splat(0.5));
        assert_eq!(world.section_count(), 25);
        for dy in -2..=2 {
            for dx in -2..=2 {
                assert_eq!(world.get_tile_at(IVec2::new(dx, dy)), Some(Tile::Water), "{dx} {dy}");
            }
        }
    }

    #[test]
    fn prefetch_near_edges() {

        let mut world = WorldState::new(small_config(3)).unwrap();

        // Middle of the section, only the section itself.
        world.check_section_generation(Vec2::new(8.5, 8.5));
        assert_eq!(world.section_count(), 1);

        // Close to the right edge.
        world.check_section_generation(Vec2::new(14.5, 8.5));
        assert!(world.contains_section(1, 0));
        assert_eq!(world.section_count(), 2);

        // Close to the top left corner, orthogonal and diagonal neighbors.
        world.check_section_generation(Vec2::new(1.5, 2.5));
        assert!(world.contains_section(-1, 0));
        assert!(world.contains_section(0, -1));
        assert!(world.contains_section(-1, -1));
        assert_eq!(world.section_count(), 5);

        // Negative coordinates, bottom edge of section (0, -1).
        world.check_section_generation(Vec2::new(8.5, -0.5));
        assert!(world.contains_section(0, -1));
        assert!(world.contains_section(0, 0));
        assert_eq!(world.section_count(), 5);

    }

    #[test]
    fn seams_are_repaired() {
        let mut world = WorldState::new(small_config(4)).unwrap();
        world.swap_events(Some(Vec::new()));
        for sy in -2..=2 {
            for sx in -2..=2 {
                world.generate_section(sx, sy);
            }
        }
        let report = world.audit();
        assert_eq!(report.total, 25 * 16 * 16);
        assert!(report.valid_ratio() > 0.95, "valid ratio: {}", report.valid_ratio());
    }

    #[test]
    fn repair_against_water_neighbor() {

        let mut world = WorldState::new(small_config(5)).unwrap();
        world.insert_section(1, 0, Section::new(16));

        let mut section = Section::new(16);
        section.set(15, 4, Tile::LandTopLeft);
        section.set(15, 5, Tile::LandLeftMiddle);
        world.insert_section(0, 0, section);

        world.swap_events(Some(Vec::new()));
        assert!(world.validate_and_fix(0, 0).unwrap() >= 1);
        assert_eq!(world.get_tile_at(IVec2::new(15, 4)), Some(Tile::Water));
        assert_eq!(world.audit().invalid, 0);
        let events = world.swap_events(None).unwrap();
        assert!(matches!(events.as_slice(), [Event::SectionRepaired { sx: 0, sy: 0, .. }]));
        assert_eq!(world.validate_and_fix(3, 3), None);

    }

    #[test]
    fn coins_are_collected() {
        let config = GenConfig { coin_chance: 1.0, ..small_config(6) };
        let mut world = WorldState::new(config).unwrap();
        world.generate_section(0, 0);
        let water = world.get_section(0, 0).unwrap().count(|tile| tile == Tile::Water);
        assert_eq!(world.coins().len(), water);
        let collected = world.collect_coins(Vec2::new(8.0, 8.0), 100.0);
        assert_eq!(collected, water);
        assert!(world.coins().is_empty());
    }

    #[test]
    fn background_generation_publishes() {

        let mut world = WorldState::new(small_config(7)).unwrap();
        assert!(!world.has_storage());
        world.attach_storage(2).unwrap();
        assert!(world.has_storage());
        world.swap_events(Some(Vec::new()));

        world.check_section_generation(Vec2::new(1.5, 1.5));
        assert_eq!(world.section_count(), 0);
        assert_eq!(world.section_state(-1, -1), SectionState::Pending);
        assert_eq!(world.pending_count(), 4);

        let deadline = Instant::now() + Duration::from_secs(30);
        while world.section_count() < 4 && Instant::now() < deadline {
            assert!(world.tick() <= world.config().max_publish_per_tick);
            std::thread::sleep(Duration::from_millis(1));
        }

        assert_eq!(world.section_count(), 4);
        assert_eq!(world.pending_count(), 0);
        assert!(world.average_generation_duration().is_some());

        let events = world.swap_events(None).unwrap();
        assert_eq!(events.iter().filter(|event| matches!(event, Event::SectionGenerated { .. })).count(), 4);

    }

    #[test]
    fn invalid_config_rejected() {
        let config = GenConfig { edge_threshold: 16, ..small_config(0) };
        assert!(matches!(WorldState::new(config), Err(WorldError::Config(_))));
    }

}
