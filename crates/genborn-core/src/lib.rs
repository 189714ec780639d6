//! # genborn Core Library
//!
//! Generalized Born (GB) implicit-solvent electrostatics for molecular systems: effective Born
//! radii, polar and nonpolar solvation energies, and the Cartesian forces consistent with them.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture to keep the numerical kernels, the
//! stateful step machinery and the public entry point apart.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`AtomRecord`, the bonded GB topology,
//!   the general short-range pair list), per-type GB parameters, the pure potential formulas,
//!   the tabulated GB kernel and the GB-specific neighbor list.
//!
//! - **[`engine`]: The Logic Core.** The stateful layer that owns the per-step buffers: the
//!   Born radius calculator for the Still, HCT and OBC models, the derivative buffer shared with
//!   the chain-rule force pass, the collectives used to reduce partial accumulators across
//!   ranks, and the energy/correction evaluator.
//!
//! - **[`workflows`]: The Public API.** [`workflows::solvate::GbSolver`] ties the engine
//!   together in the mandatory phase order (neighbor list, radii, reduction, energies, chain
//!   rule) and is the entry point for simulation engines embedding this library.

pub mod core;
pub mod engine;
pub mod workflows;
