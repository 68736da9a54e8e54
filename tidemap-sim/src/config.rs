//! The configuration for the simulation, given from environment variables and lazy
//! initialized when needed.

use std::num::NonZeroUsize;
use std::str::FromStr;
use std::env;

use once_cell::race::{OnceBool, OnceNonZeroUsize};
use once_cell::sync::OnceCell;

use tidemap::util::gen_seed;


const DEFAULT_SECTION_SIZE: NonZeroUsize = NonZeroUsize::new(100).unwrap();
const DEFAULT_WORKERS: NonZeroUsize = NonZeroUsize::new(2).unwrap();
const DEFAULT_TICKS: u64 = 600;

/// Parse an environment variable, none if missing or invalid.
fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok()?.trim().parse().ok()
}

/// Return the world seed, a random seed is chosen if not configured.
///
/// To choose the seed, set `TIDEMAP_SEED=<seed>`.
pub fn seed() -> i64 {
    static ENV: OnceCell<i64> = OnceCell::new();
    *ENV.get_or_init(|| parse_var("TIDEMAP_SEED").unwrap_or_else(gen_seed))
}

/// Return the side length of sections, in tiles, 100 by default.
///
/// To change it, set `TIDEMAP_SECTION_SIZE=<size>`.
pub fn section_size() -> u32 {
    static ENV: OnceNonZeroUsize = OnceNonZeroUsize::new();
    ENV.get_or_init(|| {
        parse_var("TIDEMAP_SECTION_SIZE")
            .and_then(NonZeroUsize::new)
            .unwrap_or(DEFAULT_SECTION_SIZE)
    }).get() as u32
}

/// Return the number of background section workers, 2 by default.
///
/// To change it, set `TIDEMAP_WORKERS=<count>`.
pub fn workers() -> usize {
    static ENV: OnceNonZeroUsize = OnceNonZeroUsize::new();
    ENV.get_or_init(|| {
        parse_var("TIDEMAP_WORKERS")
            .and_then(NonZeroUsize::new)
            .unwrap_or(DEFAULT_WORKERS)
    }).get()
}

/// Return the number of ticks to simulate, none to run until interrupted. 600 ticks
/// by default.
///
/// To change it, set `TIDEMAP_TICKS=<count>`, zero runs until interrupted.
pub fn ticks() -> Option<u64> {
    static ENV: OnceCell<u64> = OnceCell::new();
    let ticks = *ENV.get_or_init(|| parse_var("TIDEMAP_TICKS").unwrap_or(DEFAULT_TICKS));
    (ticks != 0).then_some(ticks)
}

/// Return true if sections are generated by background workers instead of on the
/// simulation thread.
///
/// To enable this feature, set `TIDEMAP_ASYNC=1`.
pub fn background() -> bool {
    static ENV: OnceBool = OnceBool::new();
    ENV.get_or_init(|| {
        env::var_os("TIDEMAP_ASYNC")
            .map(|s| s.as_encoded_bytes() == b"1")
            .unwrap_or(false)
    })
}
