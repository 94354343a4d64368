//! Talent Hasher - talent build strings to in-game loadout export codes

pub mod core;
pub mod encoding;
pub mod hash_cache;
pub mod hasher;
pub mod metadata;
pub mod pool;
pub mod resolver;
pub mod selection;
pub mod storage;

pub use crate::core::error::{HashError, Result};
pub use hash_cache::{HashCache, LoadoutKey};
pub use hasher::TalentHasher;
