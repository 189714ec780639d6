use super::{RadiusInput, RadiusKernel, checked_radius};
use crate::core::forcefield::log_table::LogTable;
use crate::core::forcefield::potentials::overlap_integral;
use crate::engine::dadx::DerivativeBuffer;
use crate::engine::error::EngineError;
use crate::engine::state::BornState;
use std::ops::Range;

/// The Hawkins-Cramer-Truhlar pairwise descreening model.
#[derive(Debug, Clone, Default)]
pub struct HctKernel {
    log: Option<LogTable>,
}

impl HctKernel {
    pub fn new(log: Option<LogTable>) -> Self {
        Self { log }
    }
}

/// Accumulates the overlap integrals of every listed partner's scaled sphere.
///
/// Each row starts from `seed(rai)` and adds `sign · ½ · I_ij`; a derivative is pushed only
/// for pairs that overlap, so the buffer is sparse in the slot sequence.
pub(super) fn accumulate_descreening<S>(
    input: &RadiusInput<'_>,
    rows: Range<usize>,
    state: &mut BornState,
    dadx: &mut DerivativeBuffer,
    log: Option<&LogTable>,
    seed: S,
    sign: f64,
) where
    S: Fn(f64) -> f64,
{
    let params = input.params;
    let ln = |x: f64| match log {
        Some(table) => table.ln(x),
        None => x.ln(),
    };

    for i in rows {
        let rai = params.offset_radius(i);
        let mut sum = seed(rai);

        for entry in input.list.entries(i..i + 1) {
            let j = entry.j;
            if !input.atoms[j].participates {
                continue;
            }
            let sk = params.offset_radius(j) * params.scale[j];
            let (_, d) = input.displacement(i, j);

            if let Some(term) = overlap_integral(d, rai, sk, ln) {
                sum += sign * 0.5 * term.value;
                dadx.push(entry.slot, term.dadx);
            }
        }
        state.accumulator[i] = sum;
    }
}

impl RadiusKernel for HctKernel {
    fn accumulate(
        &self,
        input: &RadiusInput<'_>,
        rows: Range<usize>,
        state: &mut BornState,
        dadx: &mut DerivativeBuffer,
    ) {
        accumulate_descreening(
            input,
            rows,
            state,
            dadx,
            self.log.as_ref(),
            |rai| 1.0 / rai,
            -1.0,
        );
    }

    fn finalize(&self, input: &RadiusInput<'_>, state: &mut BornState) -> Result<(), EngineError> {
        for i in 0..state.natoms() {
            let min_radius = input.params.radius[i];
            let sum = state.accumulator[i];
            let unclamped = 1.0 / sum;

            let clamped = !(sum > 0.0 && unclamped > min_radius);
            let radius = if clamped { min_radius } else { unclamped };
            state.clamped[i] = clamped;
            state.set_radius(i, checked_radius(i, radius)?);
        }
        Ok(())
    }

    #[inline]
    fn chain_factor(&self, state: &BornState, atom: usize, dvda: f64) -> f64 {
        if state.clamped[atom] {
            return 0.0;
        }
        let r = state.radius[atom];
        r * r * dvda
    }
}
