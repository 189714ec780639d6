use super::hct::accumulate_descreening;
use super::{RadiusInput, RadiusKernel, checked_radius};
use crate::core::forcefield::log_table::LogTable;
use crate::engine::config::ObcParams;
use crate::engine::dadx::DerivativeBuffer;
use crate::engine::error::EngineError;
use crate::engine::state::BornState;
use std::ops::Range;

/// The Onufriev-Bashford-Case model: the HCT descreening sum passed through a tanh
/// rescaling, which keeps radii bounded without a hard floor.
#[derive(Debug, Clone)]
pub struct ObcKernel {
    params: ObcParams,
    log: Option<LogTable>,
}

impl ObcKernel {
    pub fn new(params: ObcParams, log: Option<LogTable>) -> Self {
        Self { params, log }
    }

    pub fn params(&self) -> ObcParams {
        self.params
    }
}

impl RadiusKernel for ObcKernel {
    fn accumulate(
        &self,
        input: &RadiusInput<'_>,
        rows: Range<usize>,
        state: &mut BornState,
        dadx: &mut DerivativeBuffer,
    ) {
        accumulate_descreening(input, rows, state, dadx, self.log.as_ref(), |_| 0.0, 1.0);
    }

    fn finalize(&self, input: &RadiusInput<'_>, state: &mut BornState) -> Result<(), EngineError> {
        let ObcParams { alpha, beta, gamma } = self.params;
        for i in 0..state.natoms() {
            let rho = input.params.radius[i];
            let rai = input.params.offset_radius(i);

            let psi = rai * state.accumulator[i];
            let psi2 = psi * psi;
            let psi3 = psi2 * psi;
            let tsum = (alpha * psi - beta * psi2 + gamma * psi3).tanh();

            let radius = checked_radius(i, 1.0 / (1.0 / rai - tsum / rho))?;
            state.set_radius(i, radius);
            state.clamped[i] = false;

            let tchain = rai * (alpha - 2.0 * beta * psi + 3.0 * gamma * psi2);
            state.drobc[i] = (1.0 - tsum * tsum) * tchain / rho;
        }
        Ok(())
    }

    #[inline]
    fn chain_factor(&self, state: &BornState, atom: usize, dvda: f64) -> f64 {
        let r = state.radius[atom];
        r * r * state.drobc[atom] * dvda
    }
}
