use thiserror::Error;

use super::comm::CommError;
use super::config::ConfigError;
use crate::core::forcefield::params::ParamLoadError;
use crate::core::forcefield::table::TableError;
use crate::core::models::topology::TopologyError;
use crate::core::neighbors::NeighborListError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Invalid GB parameters: {source}")]
    Parameters {
        #[from]
        source: ParamLoadError,
    },

    #[error("Invalid bonded GB topology: {source}")]
    Topology {
        #[from]
        source: TopologyError,
    },

    #[error("GB neighbor list construction failed: {source}")]
    NeighborList {
        #[from]
        source: NeighborListError,
    },

    #[error("GB kernel table lookup failed: {source}")]
    TableRange {
        #[from]
        source: TableError,
    },

    #[error("Collective operation failed: {source}")]
    Comm {
        #[from]
        source: CommError,
    },

    #[error("Length mismatch for {what}: expected {expected}, found {found}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Atom {atom} has a non-positive radius {radius} after removing the dielectric offset")]
    InvalidRadius { atom: usize, radius: f64 },

    #[error("Born radius of atom {atom} is not finite and positive: {value}")]
    NonFiniteRadius { atom: usize, value: f64 },

    #[error("Failed to grow the derivative buffer to {requested} entries")]
    BufferAllocation { requested: usize },

    #[error(
        "Derivative buffer was produced for neighbor list generation {buffer}, but the current list is generation {list}"
    )]
    StaleDerivatives { buffer: u64, list: u64 },

    #[error("Derivative buffer entry for slot {found} does not follow the traversal order (previous slot {previous:?})")]
    TraversalOrder {
        previous: Option<usize>,
        found: usize,
    },
}
