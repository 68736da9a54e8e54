//! Generation configuration, passed explicitly to the world instead of living in
//! process-wide constants.


/// Every tunable value of map generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenConfig {
    /// The world seed, each section derives its own generator from it.
    pub seed: i64,
    /// Side length of a section, in tiles.
    pub section_size: u32,
    /// Size of a tile in world units, used to convert continuous positions.
    pub tile_size: f32,
    /// Distance to a section border, in tiles, under which neighbor sections are
    /// generated ahead of the player.
    pub edge_threshold: u32,
    /// Probability that a collapsed cell prefers water.
    pub water_probability: f32,
    /// Probability that a collapsed cell prefers a rock, when it did not prefer water.
    pub rock_probability: f32,
    /// Probability of continuing interior land next to existing interior land.
    pub land_middle_bias: f32,
    /// Number of full grid restarts allowed before a section falls back to water.
    pub max_restarts: u32,
    /// Maximum number of tiles the repairer changes in a single section.
    pub max_fixes: u32,
    /// Radius of the square forced to water around the spawn, 2 gives a 5x5 area.
    pub spawn_radius: u32,
    /// Probability that a water tile holds a coin.
    pub coin_chance: f32,
    /// Maximum number of sections generated in background that are published in a
    /// single tick.
    pub max_publish_per_tick: usize,
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            section_size: 100,
            tile_size: 32.0,
            edge_threshold: 20,
            water_probability: 0.75,
            rock_probability: 0.01,
            land_middle_bias: 0.7,
            max_restarts: 8,
            max_fixes: 50,
            spawn_radius: 2,
            coin_chance: 0.01,
            max_publish_per_tick: 4,
        }
    }
}

impl GenConfig {

    /// Default configuration with the given seed.
    pub fn with_seed(seed: i64) -> Self {
        Self { seed, ..Self::default() }
    }

    /// Check that values are usable together.
    pub fn validate(&self) -> Result<(), ConfigError> {

        if self.section_size == 0 {
            return Err(ConfigError::EmptySection);
        }

        if self.edge_threshold >= self.section_size {
            return Err(ConfigError::ThresholdTooLarge {
                threshold: self.edge_threshold,
                size: self.section_size,
            });
        }

        if self.tile_size.is_nan() || self.tile_size <= 0.0 {
            return Err(ConfigError::InvalidTileSize(self.tile_size));
        }

        for (name, value) in [
            ("water_probability", self.water_probability),
            ("rock_probability", self.rock_probability),
            ("land_middle_bias", self.land_middle_bias),
            ("coin_chance", self.coin_chance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Probability { name, value });
            }
        }

        Ok(())

    }

}


/// Error returned when validating a [`GenConfig`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("section size must not be zero")]
    EmptySection,
    #[error("edge threshold {threshold} must be smaller than the section size {size}")]
    ThresholdTooLarge { threshold: u32, size: u32 },
    #[error("tile size must be positive, got {0}")]
    InvalidTileSize(f32),
    #[error("{name} must be a probability, got {value}")]
    Probability { name: &'static str, value: f32 },
}


#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn default_is_valid() {
        assert_eq!(GenConfig::default().validate(), Ok(()));
        assert_eq!(GenConfig::with_seed(5).seed, 5);
    }

    #[test]
    fn invalid_values() {

        let config = GenConfig { section_size: 0, ..GenConfig::default() };
        assert_eq!(config.validate(), Err(ConfigError::EmptySection));

        let config = GenConfig { section_size: 10, edge_threshold: 10, ..GenConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::ThresholdTooLarge { .. })));

        let config = GenConfig { water_probability: 1.5, ..GenConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Probability { name: "water_probability", .. })));

    }

}
