//! # Workflows Module
//!
//! The public entry point for simulation engines embedding the solver.
//!
//! - **Solvation Step** ([`solvate`]) - [`solvate::GbSolver`] owns the neighbor list, the
//!   radius calculator and the per-step buffers, and runs the phases of one force evaluation
//!   in order: radii, reduction, energies, reduction of `dE/dR`, chain rule.

pub mod solvate;
