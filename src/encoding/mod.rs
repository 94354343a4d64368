//! Bit-exact loadout serialization

pub mod bit_writer;
pub mod loadout;

pub use bit_writer::BitWriter;
pub use loadout::LoadoutEncoder;
