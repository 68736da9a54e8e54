//! Procedural generation of an infinite 2D sea map, made of lazily generated square
//! sections of coastline tiles through wave function collapse.

pub mod util;

pub mod tile;
pub mod grammar;
pub mod section;
pub mod config;

pub mod wfc;
pub mod storage;
pub mod world;
