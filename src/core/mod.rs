pub mod config;
pub mod error;
pub mod types;

pub use config::{ClassProfile, HasherConfig, HeroMarker};
pub use error::{HashError, Result};
pub use types::{EntryId, HeroChoice, NodeId, TalentId};
