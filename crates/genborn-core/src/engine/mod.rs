//! # Engine Module
//!
//! The stateful layer of the solver: everything that is rewritten on every step.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Model selection, dielectric constants and table settings
//! - **Collectives** ([`comm`]) - Home ranges and the sum-reduction used between phases
//! - **Born Radii** ([`radii`]) - The Still, HCT and OBC kernels behind one calculator
//! - **Derivative Buffer** ([`dadx`]) - Slot-tagged radial derivatives shared by the radius
//!   pass and the force pass
//! - **Energies** ([`energy`]) - Tabulated pair terms, the self-energy and the nonpolar term
//! - **Chain Rule** ([`chainrule`]) - Forces from `dE/dR` through the buffered derivatives
//! - **State** ([`state`]) - Per-atom radii and model intermediates
//! - **Error Handling** ([`error`]) - The engine error type
//!
//! Every phase takes the rank's home range explicitly, so the serial path is the parallel
//! path with a single rank.

pub mod chainrule;
pub mod comm;
pub mod config;
pub mod dadx;
pub mod energy;
pub mod error;
pub mod radii;
pub mod state;
