//! Born radius calculation for the Still, HCT and OBC models.
//!
//! Every model runs in the same three steps behind [`RadiusKernel`]: accumulate the rows this
//! rank owns (writing one derivative per contributing pair, in traversal order), sum the
//! per-atom accumulators across ranks, then finalize every atom's radius from the summed
//! accumulator. With a single rank the reduction is the identity and the code path is the
//! same.

mod hct;
mod obc;
mod still;

pub use hct::HctKernel;
pub use obc::ObcKernel;
pub use still::StillKernel;

use super::comm::Communicator;
use super::config::{GbAlgorithm, GbConfig, LogMethod};
use super::dadx::DerivativeBuffer;
use super::error::EngineError;
use super::state::BornState;
use crate::core::forcefield::log_table::LogTable;
use crate::core::forcefield::params::ModelParameters;
use crate::core::models::atom::AtomRecord;
use crate::core::models::topology::GbTopology;
use crate::core::neighbors::{BondedInclusion, NeighborList};
use std::ops::Range;
use tracing::trace;

/// Everything a kernel reads during one radius pass.
#[derive(Debug, Clone, Copy)]
pub struct RadiusInput<'a> {
    pub atoms: &'a [AtomRecord],
    pub params: &'a ModelParameters,
    pub list: &'a NeighborList,
}

impl RadiusInput<'_> {
    /// The displacement `x_i − x_j` and its length.
    #[inline]
    pub fn displacement(&self, i: usize, j: usize) -> (nalgebra::Vector3<f64>, f64) {
        let dx = self.atoms[i].position - self.atoms[j].position;
        let d = dx.norm();
        (dx, d)
    }
}

pub trait RadiusKernel {
    /// Computes setup-time per-atom data. Called once before the first step.
    fn initialize(
        &self,
        _atoms: &[AtomRecord],
        _params: &ModelParameters,
        _topology: &GbTopology,
        _state: &mut BornState,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Accumulates the rows `rows` into `state.accumulator` and pushes one derivative per
    /// contributing pair into `dadx`, in traversal order.
    fn accumulate(
        &self,
        input: &RadiusInput<'_>,
        rows: Range<usize>,
        state: &mut BornState,
        dadx: &mut DerivativeBuffer,
    );

    /// Converts the reduced accumulator of every atom into its Born radius.
    fn finalize(&self, input: &RadiusInput<'_>, state: &mut BornState)
    -> Result<(), EngineError>;

    /// Rescales `dE/dR` of `atom` into the factor multiplying its buffered derivatives.
    fn chain_factor(&self, state: &BornState, atom: usize, dvda: f64) -> f64;
}

/// The radius model, selected once from the configuration.
#[derive(Debug, Clone)]
pub enum BornModel {
    Still(StillKernel),
    Hct(HctKernel),
    Obc(ObcKernel),
}

impl BornModel {
    pub fn from_config(config: &GbConfig) -> Self {
        let log = match config.log_method {
            LogMethod::Exact => None,
            LogMethod::Table => Some(LogTable::default()),
        };
        match config.algorithm {
            GbAlgorithm::Still => Self::Still(StillKernel),
            GbAlgorithm::Hct => Self::Hct(HctKernel::new(log)),
            GbAlgorithm::Obc => Self::Obc(ObcKernel::new(config.obc, log)),
        }
    }

    pub fn algorithm(&self) -> GbAlgorithm {
        match self {
            Self::Still(_) => GbAlgorithm::Still,
            Self::Hct(_) => GbAlgorithm::Hct,
            Self::Obc(_) => GbAlgorithm::Obc,
        }
    }

    /// Which bonded GB pairs the model's neighbor list needs.
    pub fn bonded_inclusion(&self) -> BondedInclusion {
        match self {
            Self::Still(_) => BondedInclusion::OneFourOnly,
            Self::Hct(_) | Self::Obc(_) => BondedInclusion::All,
        }
    }

    pub fn kernel(&self) -> &dyn RadiusKernel {
        match self {
            Self::Still(kernel) => kernel,
            Self::Hct(kernel) => kernel,
            Self::Obc(kernel) => kernel,
        }
    }
}

/// Owns the derivative buffer and drives one kernel through a radius pass.
#[derive(Debug, Clone)]
pub struct RadiusCalculator {
    model: BornModel,
    dadx: DerivativeBuffer,
}

impl RadiusCalculator {
    pub fn new(model: BornModel) -> Self {
        Self {
            model,
            dadx: DerivativeBuffer::new(),
        }
    }

    pub fn model(&self) -> &BornModel {
        &self.model
    }

    pub fn derivatives(&self) -> &DerivativeBuffer {
        &self.dadx
    }

    pub fn initialize(
        &self,
        atoms: &[AtomRecord],
        params: &ModelParameters,
        topology: &GbTopology,
        state: &mut BornState,
    ) -> Result<(), EngineError> {
        self.model
            .kernel()
            .initialize(atoms, params, topology, state)
    }

    /// Computes the Born radius of every atom.
    ///
    /// This rank accumulates only its home rows; the accumulators are then summed across
    /// ranks and every rank finalizes all atoms from the same sums.
    pub fn compute<C>(
        &mut self,
        input: &RadiusInput<'_>,
        state: &mut BornState,
        comm: &C,
    ) -> Result<(), EngineError>
    where
        C: Communicator + ?Sized,
    {
        let natoms = input.atoms.len();
        check_len("model parameters", natoms, input.params.len())?;
        check_len("neighbor list", natoms, input.list.natoms())?;
        check_len("Born state", natoms, state.natoms())?;

        let home = comm.home_range(natoms);
        let kernel = self.model.kernel();

        self.dadx.reset(input.list)?;
        state.accumulator.iter_mut().for_each(|a| *a = 0.0);
        kernel.accumulate(input, home.as_range(), state, &mut self.dadx);
        trace!(
            "Rank {} accumulated rows {:?} with {} derivative entries",
            comm.rank(),
            home,
            self.dadx.len()
        );

        comm.sum_reduce(&mut state.accumulator)?;
        kernel.finalize(input, state)
    }

    /// Writes the rescaled chain-rule factor of every atom into `factors`.
    pub fn chain_factors(&self, state: &BornState, dvda: &[f64], factors: &mut Vec<f64>) {
        let kernel = self.model.kernel();
        factors.clear();
        factors.extend(
            dvda.iter()
                .enumerate()
                .map(|(atom, &d)| kernel.chain_factor(state, atom, d)),
        );
    }
}

fn check_len(what: &'static str, expected: usize, found: usize) -> Result<(), EngineError> {
    if expected == found {
        Ok(())
    } else {
        Err(EngineError::LengthMismatch {
            what,
            expected,
            found,
        })
    }
}

/// Rejects radii that are not finite and positive.
#[inline]
pub(crate) fn checked_radius(atom: usize, value: f64) -> Result<f64, EngineError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(EngineError::NonFiniteRadius { atom, value })
    }
}
