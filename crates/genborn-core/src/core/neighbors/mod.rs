//! The GB-specific neighbor list.
//!
//! Distinct from the general non-bonded list: it adds the bonded GB pairs the descreening
//! models need, removes duplicates per source and stores every pair from both endpoints, so
//! that the radius pass and the chain-rule pass can walk identical slot sequences.

mod builder;
mod list;

pub use builder::{BondedInclusion, NeighborListBuilder, NeighborListError};
pub use list::{NeighborList, PairEntry, PairSlot};
