//! Headless simulation of a boat sailing on an infinite generated sea, this drives the
//! section generation the same way the game loop does.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use std::process::ExitCode;
use std::sync::Arc;

use glam::Vec2;

use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use tidemap::config::GenConfig;
use tidemap::world::{Event, WorldState, WorldError};

mod config;
mod boat;

use boat::Boat;


/// Target tick duration (60 TPS).
const TICK_DURATION: Duration = Duration::from_micros(1_000_000 / 60);


pub fn main() -> ExitCode {

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let running = Arc::new(AtomicBool::new(true));
    let handler_running = Arc::clone(&running);
    if let Err(err) = ctrlc::set_handler(move || handler_running.store(false, Ordering::Relaxed)) {
        warn!(%err, "failed to set the interrupt handler");
    }

    match Sim::new() {
        Ok(mut sim) => {
            sim.run(&running);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "failed to start simulation");
            ExitCode::FAILURE
        }
    }

}


/// The simulation state.
struct Sim {
    world: WorldState,
    boat: Boat,
    /// Number of ticks run so far.
    ticks: u64,
}

impl Sim {

    fn new() -> Result<Self, WorldError> {

        let section_size = config::section_size();
        let gen_config = GenConfig {
            section_size,
            edge_threshold: (section_size / 5).min(section_size - 1),
            ..GenConfig::with_seed(config::seed())
        };

        info!(seed = gen_config.seed, section_size, "creating world");

        let tile_size = gen_config.tile_size;
        let seed = gen_config.seed;
        let mut world = WorldState::new(gen_config)?;
        world.swap_events(Some(Vec::new()));

        let spawn = Vec2::splat(tile_size / 2.0);
        let report = world.init_around(spawn);
        info!(valid = report.valid_ratio(), sections = world.section_count(), "initial sea generated");

        if config::background() {
            world.attach_storage(config::workers())?;
        }

        Ok(Self {
            world,
            boat: Boat::new(spawn, tile_size, seed),
            ticks: 0,
        })

    }

    /// Run the simulation until the configured number of ticks or until interrupted.
    fn run(&mut self, running: &AtomicBool) {

        let max_ticks = config::ticks();

        while running.load(Ordering::Relaxed) && max_ticks.is_none_or(|max| self.ticks < max) {
            self.tick_padded();
        }

        let pos = self.boat.pos();
        info!(ticks = self.ticks, sections = self.world.section_count(),
            x = pos.x, y = pos.y, score = self.boat.score, bumps = self.boat.bumps,
            "simulation stopped");

        if let Some(duration) = self.world.average_generation_duration() {
            info!(?duration, "average background section generation");
        }

    }

    /// Run a single tick and wait for it to approximately last the tick duration, there
    /// is no sleep if the tick was too long, in such case a warning is logged.
    fn tick_padded(&mut self) {

        let start = Instant::now();
        self.tick();
        let elapsed = start.elapsed();

        if let Some(missing) = TICK_DURATION.checked_sub(elapsed) {
            std::thread::sleep(missing);
        } else {
            warn!("tick too long {:?}, expected {:?}", elapsed, TICK_DURATION);
        }

    }

    /// Run a single tick of the boat and the world.
    fn tick(&mut self) {

        self.boat.tick(&mut self.world);
        self.world.tick();

        let events = self.world.swap_events(Some(Vec::new())).unwrap_or_default();
        for event in events {
            match event {
                Event::SectionGenerated { sx, sy, fallback, coins } => {
                    debug!(sx, sy, fallback, coins, "section published");
                }
                Event::SectionRepaired { sx, sy, fixes } => {
                    debug!(sx, sy, fixes, "section repaired");
                }
                Event::SpawnPatched { .. } => {}
            }
        }

        self.ticks += 1;

    }

}
