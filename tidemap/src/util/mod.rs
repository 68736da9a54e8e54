//! Various grid and randomness utilities.

mod rand;
mod dir;

pub use rand::{SeaRandom, gen_seed, section_seed};
pub use dir::Dir;
