use super::{RadiusInput, RadiusKernel, checked_radius};
use crate::core::forcefield::params::ModelParameters;
use crate::core::forcefield::potentials::{
    ONE_4PI_EPS0, STILL_CAP_SCALE, STILL_P1, STILL_P2, STILL_P3, STILL_P4, cap_volume,
    still_switch,
};
use crate::core::models::atom::AtomRecord;
use crate::core::models::topology::{BondedKind, GbTopology};
use crate::engine::dadx::DerivativeBuffer;
use crate::engine::error::EngineError;
use crate::engine::state::BornState;
use std::f64::consts::PI;
use std::ops::Range;
use tracing::debug;

/// The analytical Still model. 1-2 and 1-3 pairs are folded into the polarization seed at
/// setup; the neighbor loop adds the switched `P4` term of every listed partner.
///
/// Non-participating atoms have no volume and no seed. Their radius is held at the
/// intrinsic radius.
#[derive(Debug, Clone, Copy, Default)]
pub struct StillKernel;

impl RadiusKernel for StillKernel {
    fn initialize(
        &self,
        atoms: &[AtomRecord],
        params: &ModelParameters,
        topology: &GbTopology,
        state: &mut BornState,
    ) -> Result<(), EngineError> {
        for (i, atom) in atoms.iter().enumerate() {
            let r = params.radius[i];
            state.vsolv[i] = if atom.participates {
                4.0 * PI / 3.0 * r * r * r
            } else {
                0.0
            };
        }

        let gb12 = topology.pairs(BondedKind::OneTwo);
        let gb13 = topology.pairs(BondedKind::OneThree);

        for pair in gb12 {
            let (a, b) = (pair.i, pair.j);
            let r = STILL_CAP_SCALE * pair.reference_distance()?;
            let (ra, rb) = (params.radius[a], params.radius[b]);
            if atoms[a].participates {
                state.vsolv[a] -= cap_volume(ra, rb, r);
            }
            if atoms[b].participates {
                state.vsolv[b] -= cap_volume(rb, ra, r);
            }
        }

        for (i, atom) in atoms.iter().enumerate() {
            state.gpol[i] = if atom.participates {
                -0.5 * ONE_4PI_EPS0 / (params.offset_radius(i) + STILL_P1)
            } else {
                0.0
            };
        }

        for (pairs, coefficient) in [(gb12, STILL_P2), (gb13, STILL_P3)] {
            for pair in pairs {
                let r = pair.reference_distance()?;
                let r4 = r * r * r * r;
                state.gpol[pair.i] += coefficient * state.vsolv[pair.j] / r4;
                state.gpol[pair.j] += coefficient * state.vsolv[pair.i] / r4;
            }
        }

        debug!(
            "Initialized Still seeds from {} 1-2 and {} 1-3 pairs",
            gb12.len(),
            gb13.len()
        );
        Ok(())
    }

    fn accumulate(
        &self,
        input: &RadiusInput<'_>,
        rows: Range<usize>,
        state: &mut BornState,
        dadx: &mut DerivativeBuffer,
    ) {
        let radius = &input.params.radius;
        for i in rows {
            let mut gpi = state.gpol[i];
            for entry in input.list.entries(i..i + 1) {
                let j = entry.j;
                let d2 = (input.atoms[i].position - input.atoms[j].position).norm_squared();
                let idr2 = 1.0 / d2;
                let idr4 = idr2 * idr2;
                let idr6 = idr4 * idr2;

                let rvdw = radius[i] + radius[j];
                let (ccf, dccf) = still_switch(d2 / (rvdw * rvdw));
                let prod = STILL_P4 * state.vsolv[j];

                gpi += prod * ccf * idr4;
                dadx.push(entry.slot, prod * (4.0 * ccf - dccf) * idr6);
            }
            state.accumulator[i] = gpi;
        }
    }

    fn finalize(&self, input: &RadiusInput<'_>, state: &mut BornState) -> Result<(), EngineError> {
        for (i, atom) in input.atoms.iter().enumerate() {
            let clamped = !atom.participates;
            let radius = if clamped {
                input.params.radius[i]
            } else {
                checked_radius(i, 0.5 * ONE_4PI_EPS0 / state.accumulator[i].abs())?
            };
            state.clamped[i] = clamped;
            state.set_radius(i, radius);
        }
        Ok(())
    }

    #[inline]
    fn chain_factor(&self, state: &BornState, atom: usize, dvda: f64) -> f64 {
        if state.clamped[atom] {
            return 0.0;
        }
        let r = state.radius[atom];
        2.0 * r * r * dvda / ONE_4PI_EPS0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::topology::BondedGbPair;
    use crate::core::neighbors::NeighborList;
    use nalgebra::Point3;

    fn pair(i: usize, j: usize, distance: f64) -> BondedGbPair {
        BondedGbPair {
            i,
            j,
            distance: Some(distance),
        }
    }

    #[test]
    fn isolated_atom_radius_is_offset_radius_plus_p1() {
        let atoms = vec![AtomRecord::new(Point3::origin(), 0.5, 0)];
        let params = ModelParameters::new(vec![0.15], vec![0.8], 0.009);
        let list = NeighborList::empty(1);
        let mut state = BornState::new(1);
        let mut dadx = DerivativeBuffer::new();
        let input = RadiusInput {
            atoms: &atoms,
            params: &params,
            list: &list,
        };

        StillKernel
            .initialize(&atoms, &params, &GbTopology::default(), &mut state)
            .unwrap();
        StillKernel.accumulate(&input, 0..1, &mut state, &mut dadx);
        StillKernel.finalize(&input, &mut state).unwrap();

        assert!((state.radius[0] - (0.15 - 0.009 + STILL_P1)).abs() < 1e-12);
        assert!(dadx.is_empty());
    }

    #[test]
    fn initialize_subtracts_cap_volumes_and_adds_bonded_seeds() {
        let atoms = vec![
            AtomRecord::new(Point3::origin(), 0.3, 0),
            AtomRecord::new(Point3::new(0.1, 0.0, 0.0), -0.3, 0),
            AtomRecord::new(Point3::new(0.2, 0.0, 0.0), 0.1, 0),
        ];
        let params = ModelParameters::new(vec![0.15, 0.15, 0.15], vec![0.8; 3], 0.009);
        let topology = GbTopology {
            gb12: vec![pair(0, 1, 0.1)],
            gb13: vec![pair(0, 2, 0.2)],
            gb14: Vec::new(),
        };
        let mut state = BornState::new(3);
        StillKernel
            .initialize(&atoms, &params, &topology, &mut state)
            .unwrap();

        let sphere = 4.0 * PI / 3.0 * 0.15f64.powi(3);
        let cap = cap_volume(0.15, 0.15, 0.101);
        assert!((state.vsolv[0] - (sphere - cap)).abs() < 1e-14);
        assert!((state.vsolv[1] - (sphere - cap)).abs() < 1e-14);
        assert!((state.vsolv[2] - sphere).abs() < 1e-14);

        let self_term = -0.5 * ONE_4PI_EPS0 / (0.15 - 0.009 + STILL_P1);
        let expected0 = self_term
            + STILL_P2 * state.vsolv[1] / 0.1f64.powi(4)
            + STILL_P3 * state.vsolv[2] / 0.2f64.powi(4);
        assert!((state.gpol[0] - expected0).abs() < 1e-9);
        let expected2 = self_term + STILL_P3 * state.vsolv[0] / 0.2f64.powi(4);
        assert!((state.gpol[2] - expected2).abs() < 1e-9);
    }

    #[test]
    fn initialize_requires_one_two_distances() {
        let atoms = vec![
            AtomRecord::new(Point3::origin(), 0.3, 0),
            AtomRecord::new(Point3::new(0.1, 0.0, 0.0), -0.3, 0),
        ];
        let params = ModelParameters::new(vec![0.15, 0.15], vec![0.8; 2], 0.009);
        let topology = GbTopology {
            gb12: vec![BondedGbPair {
                i: 0,
                j: 1,
                distance: None,
            }],
            ..GbTopology::default()
        };
        let mut state = BornState::new(2);
        let result = StillKernel.initialize(&atoms, &params, &topology, &mut state);
        assert!(matches!(result, Err(EngineError::Topology { .. })));
    }

    #[test]
    fn non_participating_atoms_neither_descreen_nor_get_seeds() {
        let atoms = vec![
            AtomRecord::new(Point3::origin(), 0.0, 0).with_participation(false),
            AtomRecord::new(Point3::new(0.3, 0.0, 0.0), 0.2, 0),
        ];
        let params = ModelParameters::new(vec![0.15, 0.15], vec![0.8; 2], 0.009);
        let mut state = BornState::new(2);
        StillKernel
            .initialize(&atoms, &params, &GbTopology::default(), &mut state)
            .unwrap();

        assert_eq!(state.vsolv[0], 0.0);
        assert_eq!(state.gpol[0], 0.0);

        let list = NeighborList::empty(2);
        let input = RadiusInput {
            atoms: &atoms,
            params: &params,
            list: &list,
        };
        let mut dadx = DerivativeBuffer::new();
        StillKernel.accumulate(&input, 0..2, &mut state, &mut dadx);
        StillKernel.finalize(&input, &mut state).unwrap();
        assert_eq!(state.radius[0], 0.15);
        assert!(state.clamped[0]);
        assert_eq!(StillKernel.chain_factor(&state, 0, 3.0), 0.0);
    }

    #[test]
    fn chain_factor_is_two_r_squared_over_k() {
        let mut state = BornState::new(1);
        state.set_radius(0, 0.2);
        let factor = StillKernel.chain_factor(&state, 0, 5.0);
        assert!((factor - 2.0 * 0.04 * 5.0 / ONE_4PI_EPS0).abs() < 1e-15);
    }
}
