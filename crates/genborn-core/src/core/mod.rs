//! # Core Module
//!
//! Fundamental, stateless building blocks of the Generalized Born solver.
//!
//! ## Architecture
//!
//! - **Molecular Representation** ([`models`]) - Atom records, bonded GB pairs and the general
//!   short-range pair list consumed from the surrounding simulation engine
//! - **Parameters and Formulas** ([`forcefield`]) - Per-type GB radii and scale factors, physical
//!   constants, the Still switching function, the HCT overlap integral and the tabulated GB kernel
//! - **GB Neighbor List** ([`neighbors`]) - The symmetric, deduplicated pair list traversed by both
//!   the radius pass and the chain-rule pass
//!
//! Everything in this layer is free of per-step mutable state; the [`crate::engine`] layer owns
//! the buffers that are rewritten every step.

pub mod forcefield;
pub mod models;
pub mod neighbors;
