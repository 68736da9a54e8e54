//! A scripted boat wandering on the sea, standing for the player.

use std::f32::consts::FRAC_PI_2;

use glam::Vec2;

use tidemap::section::calc_tile_pos;
use tidemap::tile::{is_land_tile, Tile};
use tidemap::util::SeaRandom;
use tidemap::world::WorldState;


/// Number of points sampled on the hull circle for collisions.
const HULL_SAMPLES: usize = 8;


/// The simulated boat.
#[derive(Debug)]
pub struct Boat {
    pos: Vec2,
    /// Heading angle, in radians.
    heading: f32,
    /// Distance sailed per tick, in world units.
    speed: f32,
    /// Radius of the hull, in world units.
    radius: f32,
    rand: SeaRandom,
    /// Number of coins collected.
    pub score: usize,
    /// Number of ticks where the boat bumped into land or a rock.
    pub bumps: u32,
}

impl Boat {

    pub fn new(pos: Vec2, tile_size: f32, seed: i64) -> Self {
        Self {
            pos,
            heading: 0.0,
            speed: tile_size / 4.0,
            radius: tile_size / 3.0,
            rand: SeaRandom::new(seed),
            score: 0,
            bumps: 0,
        }
    }

    #[inline]
    pub fn pos(&self) -> Vec2 {
        self.pos
    }

    /// Sail for a single tick: generate the sea ahead, move forward unless blocked, in
    /// which case the boat turns, and finally collect coins under the hull.
    pub fn tick(&mut self, world: &mut WorldState) {

        world.check_section_generation(self.pos);

        if self.rand.next_chance(0.02) {
            self.heading += (self.rand.next_float() - 0.5) * FRAC_PI_2;
        }

        let next = self.pos + Vec2::from_angle(self.heading) * self.speed;
        if self.collides(world, next) {
            self.bumps += 1;
            self.heading += if self.rand.next_chance(0.5) { FRAC_PI_2 } else { -FRAC_PI_2 };
        } else {
            self.pos = next;
        }

        self.score += world.collect_coins(self.pos, self.radius * 2.0);

    }

    /// Return true if the hull centered on the given position overlaps the solid part
    /// of a tile. Tiles of sections not yet generated never collide.
    fn collides(&self, world: &WorldState, center: Vec2) -> bool {

        let tile_size = world.config().tile_size;
        let hull = (0..HULL_SAMPLES).map(|i| {
            let angle = i as f32 / HULL_SAMPLES as f32 * std::f32::consts::TAU;
            center + Vec2::from_angle(angle) * self.radius
        });

        std::iter::once(center).chain(hull).any(|point| {
            let tile_pos = calc_tile_pos(point, tile_size);
            let tile = world.get_tile_at(tile_pos);
            let local = point - tile_pos.as_vec2() * tile_size;
            (is_land_tile(tile) || tile == Some(Tile::Rock))
                && tile.is_some_and(|tile| tile.collides_at(local, tile_size))
        })

    }

}


#[cfg(test)]
mod tests {

    use super::*;
    use tidemap::config::GenConfig;
    use tidemap::section::Section;

    #[test]
    fn land_blocks_the_boat() {

        let config = GenConfig { section_size: 16, edge_threshold: 4, ..GenConfig::with_seed(11) };
        let tile_size = config.tile_size;
        let mut world = WorldState::new(config).unwrap();

        let mut section = Section::new(16);
        for y in 0..16 {
            section.set(10, y, Tile::LandMiddle);
        }
        world.insert_section(0, 0, section);

        let mut boat = Boat::new(Vec2::new(9.2, 8.5) * tile_size, tile_size, 3);
        for _ in 0..40 {
            boat.tick(&mut world);
            assert!(!boat.collides(&world, boat.pos()));
            assert!(boat.pos().x < 10.0 * tile_size);
        }

        assert!(boat.bumps > 0);

    }

}
