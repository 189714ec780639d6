//! # Core Models Module
//!
//! Data structures describing the molecular system as seen by the GB solver.
//!
//! - [`atom`] - Per-atom position, charge, type index and solvation participation
//! - [`topology`] - Bonded 1-2/1-3/1-4 GB pairs derived from bonds, angles and 1-4 pairs
//! - [`pairlist`] - The general short-range pair list produced by the external pair search
//!
//! ```ignore
//! use genborn::core::models::{atom::AtomRecord, topology::{Bond, GbTopology}};
//!
//! let atoms = vec![
//!     AtomRecord::new(Point3::new(0.0, 0.0, 0.0), 0.4, 0),
//!     AtomRecord::new(Point3::new(0.1, 0.0, 0.0), -0.4, 1),
//! ];
//! let topology = GbTopology::generate(&atoms, &[Bond::new(0, 1, 0.1)], &[], &[])?;
//! ```

pub mod atom;
pub mod pairlist;
pub mod topology;
