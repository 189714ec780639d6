use crate::core::forcefield::params::ModelParameters;
use crate::core::forcefield::table::GbTable;
use crate::core::forcefield::term::SolvationTerms;
use crate::core::models::atom::AtomRecord;
use crate::core::models::pairlist::ShortRangePairList;
use crate::core::models::topology::{BondedGbPair, GbTopology, TopologyError};
use crate::core::neighbors::{NeighborList, NeighborListBuilder};
use crate::engine::chainrule::distribute_forces;
use crate::engine::comm::{AtomRange, Communicator, SerialCommunicator};
use crate::engine::config::{ConfigError, GbAlgorithm, GbConfig};
use crate::engine::energy::{
    EnergyInput, bonded_gb_energy, nonpolar_energy, pair_gb_energy, self_energy,
};
use crate::engine::error::EngineError;
use crate::engine::radii::{BornModel, RadiusCalculator, RadiusInput};
use crate::engine::state::BornState;
use nalgebra::Vector3;
use tracing::{debug, info, instrument};

/// The result of one solver step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    /// Energy contributions, already summed over all ranks.
    pub terms: SolvationTerms,
    /// This rank's additive force contribution in kJ/(mol·nm). Summing over ranks gives the
    /// total; with a single rank these are the total forces.
    pub forces: Vec<Vector3<f64>>,
}

/// Generalized Born solver for a fixed set of atoms.
///
/// Created once per system; [`GbSolver::update_pairlist`] is called whenever the host
/// rebuilds its short-range pair list and [`GbSolver::step`] on every force evaluation.
#[derive(Debug)]
pub struct GbSolver<C: Communicator = SerialCommunicator> {
    config: GbConfig,
    params: ModelParameters,
    topology: GbTopology,
    bonded: Vec<BondedGbPair>,
    pairlist: ShortRangePairList,
    table: GbTable,
    builder: NeighborListBuilder,
    radii: RadiusCalculator,
    state: BornState,
    dvda: Vec<f64>,
    factors: Vec<f64>,
    comm: C,
}

impl GbSolver<SerialCommunicator> {
    /// A single-rank solver.
    pub fn serial(
        config: GbConfig,
        atoms: &[AtomRecord],
        params: ModelParameters,
        topology: GbTopology,
    ) -> Result<Self, EngineError> {
        Self::new(config, atoms, params, topology, SerialCommunicator)
    }
}

impl<C: Communicator> GbSolver<C> {
    /// Validates the inputs, tabulates the GB kernel and runs the model's setup-time
    /// initialization.
    #[instrument(skip_all, name = "gb_setup")]
    pub fn new(
        config: GbConfig,
        atoms: &[AtomRecord],
        params: ModelParameters,
        topology: GbTopology,
        comm: C,
    ) -> Result<Self, EngineError> {
        let natoms = atoms.len();
        if params.len() != natoms {
            return Err(EngineError::LengthMismatch {
                what: "model parameters",
                expected: natoms,
                found: params.len(),
            });
        }
        if params.dielectric_offset != config.dielectric_offset {
            return Err(ConfigError::InvalidValue {
                name: "dielectric_offset",
                reason: format!(
                    "parameters were resolved with {} but the run uses {}",
                    params.dielectric_offset, config.dielectric_offset
                ),
            }
            .into());
        }
        for i in 0..natoms {
            let offset_radius = params.offset_radius(i);
            if !(offset_radius > 0.0) {
                return Err(EngineError::InvalidRadius {
                    atom: i,
                    radius: offset_radius,
                });
            }
        }
        if let Some(index) = topology
            .iter()
            .map(|(_, pair)| pair.i.max(pair.j))
            .find(|&index| index >= natoms)
        {
            return Err(TopologyError::AtomIndexOutOfRange { index, natoms }.into());
        }

        let table = GbTable::generate(config.table_scale, config.table_extent)?;
        let radii = RadiusCalculator::new(BornModel::from_config(&config));
        let mut state = BornState::new(natoms);
        radii.initialize(atoms, &params, &topology, &mut state)?;

        info!(
            "GB solver ready: {} model, {} atoms, {} bonded GB pairs, rank {} of {}",
            config.algorithm,
            natoms,
            topology.len(),
            comm.rank(),
            comm.size()
        );
        debug!(
            "Tabulated GB kernel with {} intervals at scale {}",
            table.len(),
            table.scale()
        );

        let bonded = topology.iter().map(|(_, pair)| *pair).collect();
        Ok(Self {
            builder: NeighborListBuilder::new(natoms),
            pairlist: ShortRangePairList::new(),
            dvda: vec![0.0; natoms],
            factors: Vec::with_capacity(natoms),
            config,
            params,
            topology,
            bonded,
            table,
            radii,
            state,
            comm,
        })
    }

    /// Rebuilds the GB neighbor list from the bonded pairs and the host's short-range pairs.
    /// Repeated pairs in `pairlist` are counted once.
    pub fn update_pairlist(&mut self, pairlist: &ShortRangePairList) -> Result<(), EngineError> {
        let inclusion = self.radii.model().bonded_inclusion();
        let list = self.builder.rebuild(inclusion, &self.topology, pairlist)?;
        debug!(
            "GB neighbor list generation {} holds {} entries",
            list.generation(),
            list.len()
        );
        self.pairlist = pairlist.deduplicated();
        Ok(())
    }

    /// Runs one full evaluation: radii, reduction, energies and the chain-rule forces.
    #[instrument(skip_all, name = "gb_step")]
    pub fn step(&mut self, atoms: &[AtomRecord]) -> Result<StepOutput, EngineError> {
        let natoms = self.state.natoms();
        if atoms.len() != natoms {
            return Err(EngineError::LengthMismatch {
                what: "atoms",
                expected: natoms,
                found: atoms.len(),
            });
        }

        let list = self.builder.list();
        let input = RadiusInput {
            atoms,
            params: &self.params,
            list,
        };
        self.radii.compute(&input, &mut self.state, &self.comm)?;

        let home = self.comm.home_range(natoms);
        let rank = self.comm.rank();
        let size = self.comm.size();
        let epsfac = self.config.epsfac();

        self.dvda.iter_mut().for_each(|d| *d = 0.0);
        let mut forces = vec![Vector3::zeros(); natoms];

        let energy_input = EnergyInput {
            atoms,
            state: &self.state,
            table: &self.table,
            epsfac,
        };

        let bonded_range = AtomRange::split(self.bonded.len(), size, rank);
        let polar_bonded = bonded_gb_energy(
            &energy_input,
            &self.bonded[bonded_range.as_range()],
            &mut self.dvda,
            &mut forces,
        )?;

        let polar_pairs = if self.config.include_nonbonded_pairs {
            let rows = AtomRange::split(self.pairlist.row_count(), size, rank);
            pair_gb_energy(
                &energy_input,
                &self.pairlist,
                rows.as_range(),
                &mut self.dvda,
                &mut forces,
            )?
        } else {
            0.0
        };

        let self_correction = self_energy(
            atoms,
            &self.state,
            epsfac,
            home.as_range(),
            &mut self.dvda,
        );

        let tension = &self.params.surface_tension;
        let factor = match self.config.algorithm {
            GbAlgorithm::Still => tension.still_factor(),
            GbAlgorithm::Hct | GbAlgorithm::Obc => tension.hct_obc_factor(),
        };
        let nonpolar = nonpolar_energy(
            atoms,
            &self.params,
            &self.state,
            factor,
            home.as_range(),
            &mut self.dvda,
        );

        let mut terms = SolvationTerms::new(polar_bonded, polar_pairs, self_correction, nonpolar)
            .to_array();
        self.comm.sum_reduce(&mut terms)?;
        self.comm.sum_reduce(&mut self.dvda)?;

        self.radii
            .chain_factors(&self.state, &self.dvda, &mut self.factors);
        distribute_forces(
            list,
            self.radii.derivatives(),
            &self.factors,
            atoms,
            home.as_range(),
            &mut forces,
        )?;

        let terms = SolvationTerms::from(terms);
        debug!("GB step on rank {}: total {:.6} kJ/mol", rank, terms.total());
        Ok(StepOutput { terms, forces })
    }

    pub fn config(&self) -> &GbConfig {
        &self.config
    }

    pub fn parameters(&self) -> &ModelParameters {
        &self.params
    }

    pub fn neighbor_list(&self) -> &NeighborList {
        self.builder.list()
    }

    pub fn state(&self) -> &BornState {
        &self.state
    }

    /// Born radii from the most recent step.
    pub fn born_radii(&self) -> &[f64] {
        &self.state.radius
    }

    pub fn inv_sqrt_radii(&self) -> &[f64] {
        &self.state.inv_sqrt_radius
    }

    /// `dE/dR` of the most recent step, reduced over all ranks.
    pub fn dvda(&self) -> &[f64] {
        &self.dvda
    }

    pub fn communicator(&self) -> &C {
        &self.comm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::potentials::NONPOLAR_TERM;
    use crate::core::models::topology::{Angle, Bond, Pair14};
    use crate::engine::comm::{CommError, LocalGroup};
    use crate::engine::config::GbConfigBuilder;
    use crate::engine::radii::test_support::{all_pairs, cluster, cluster_params};
    use nalgebra::Point3;

    fn config(algorithm: GbAlgorithm) -> GbConfig {
        GbConfigBuilder::new().algorithm(algorithm).build().unwrap()
    }

    fn solver_with<C: Communicator>(algorithm: GbAlgorithm, comm: C) -> GbSolver<C> {
        let atoms = cluster();
        let mut solver = GbSolver::new(
            config(algorithm),
            &atoms,
            cluster_params(atoms.len(), 0.009),
            GbTopology::default(),
            comm,
        )
        .unwrap();
        solver.update_pairlist(&all_pairs(atoms.len())).unwrap();
        solver
    }

    fn serial_step(algorithm: GbAlgorithm, atoms: &[AtomRecord]) -> StepOutput {
        let mut solver = solver_with(algorithm, SerialCommunicator);
        solver.step(atoms).unwrap()
    }

    fn close(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() <= tolerance * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn repeated_steps_are_deterministic() {
        let atoms = cluster();
        for algorithm in [GbAlgorithm::Still, GbAlgorithm::Hct, GbAlgorithm::Obc] {
            let mut solver = solver_with(algorithm, SerialCommunicator);
            let first = solver.step(&atoms).unwrap();
            let radii = solver.born_radii().to_vec();
            let second = solver.step(&atoms).unwrap();
            assert_eq!(first, second);
            assert_eq!(radii, solver.born_radii());
        }
    }

    #[test]
    fn radii_are_finite_and_positive_and_inverse_roots_match() {
        let atoms = cluster();
        for algorithm in [GbAlgorithm::Still, GbAlgorithm::Hct, GbAlgorithm::Obc] {
            let mut solver = solver_with(algorithm, SerialCommunicator);
            solver.step(&atoms).unwrap();
            for (r, isa) in solver.born_radii().iter().zip(solver.inv_sqrt_radii()) {
                assert!(r.is_finite() && *r > 0.0);
                assert!((isa * isa * r - 1.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn forces_sum_to_zero() {
        let atoms = cluster();
        for algorithm in [GbAlgorithm::Still, GbAlgorithm::Hct, GbAlgorithm::Obc] {
            let output = serial_step(algorithm, &atoms);
            let total: Vector3<f64> = output.forces.iter().sum();
            assert!(total.norm() < 1e-9, "{algorithm}: net force {total}");
        }
    }

    #[test]
    fn forces_match_finite_difference_of_energy() {
        let atoms = cluster();
        let h = 1e-6;
        for algorithm in [GbAlgorithm::Still, GbAlgorithm::Hct, GbAlgorithm::Obc] {
            let output = serial_step(algorithm, &atoms);
            for i in 0..atoms.len() {
                for k in 0..3 {
                    let mut plus = atoms.clone();
                    let mut minus = atoms.clone();
                    plus[i].position[k] += h;
                    minus[i].position[k] -= h;
                    let e_plus = serial_step(algorithm, &plus).terms.total();
                    let e_minus = serial_step(algorithm, &minus).terms.total();
                    let numeric = -(e_plus - e_minus) / (2.0 * h);
                    let analytic = output.forces[i][k];
                    assert!(
                        (numeric - analytic).abs() < 1e-2,
                        "{algorithm}: atom {i} axis {k}: {analytic} vs {numeric}"
                    );
                }
            }
        }
    }

    #[test]
    fn distributed_steps_match_serial_step() {
        let atoms = cluster();
        for algorithm in [GbAlgorithm::Still, GbAlgorithm::Hct, GbAlgorithm::Obc] {
            let serial = {
                let mut solver = solver_with(algorithm, SerialCommunicator);
                let output = solver.step(&atoms).unwrap();
                (output, solver.born_radii().to_vec())
            };

            for ranks in [2, 3, 4] {
                let outputs = LocalGroup::run(ranks, |comm| {
                    let mut solver = solver_with(algorithm, comm);
                    let output = solver.step(&atoms).unwrap();
                    (output, solver.born_radii().to_vec())
                })
                .unwrap();

                let mut forces = vec![Vector3::zeros(); atoms.len()];
                for (output, radii) in &outputs {
                    assert_eq!(radii, &serial.1);
                    assert!(close(output.terms.total(), serial.0.terms.total(), 1e-10));
                    for (f, partial) in forces.iter_mut().zip(&output.forces) {
                        *f += partial;
                    }
                }
                for (f, expected) in forces.iter().zip(&serial.0.forces) {
                    for k in 0..3 {
                        assert!(close(f[k], expected[k], 1e-10));
                    }
                }
            }
        }
    }

    #[test]
    fn permuted_pair_order_leaves_results_unchanged() {
        let atoms = cluster();
        let natoms = atoms.len();
        let mut reversed = ShortRangePairList::new();
        for i in (0..natoms).rev() {
            let partners: Vec<usize> = (0..i).rev().collect();
            reversed.push_row(i, &partners);
        }

        for algorithm in [GbAlgorithm::Hct, GbAlgorithm::Obc] {
            let reference = serial_step(algorithm, &atoms);
            let mut solver = solver_with(algorithm, SerialCommunicator);
            solver.update_pairlist(&reversed).unwrap();
            let permuted = solver.step(&atoms).unwrap();

            assert!(close(permuted.terms.total(), reference.terms.total(), 1e-12));
            for (a, b) in permuted.forces.iter().zip(&reference.forces) {
                assert!((a - b).norm() < 1e-9);
            }
        }
    }

    #[test]
    fn two_like_charges_with_zero_scales_match_closed_form() {
        let rho = 0.15;
        let r: f64 = 0.4;
        let q = 0.5;
        let atoms = vec![
            AtomRecord::new(Point3::origin(), q, 0),
            AtomRecord::new(Point3::new(r, 0.0, 0.0), q, 0),
        ];
        let params = ModelParameters::new(vec![rho; 2], vec![0.0; 2], 0.009);
        let config = config(GbAlgorithm::Hct);
        let epsfac = config.epsfac();
        let mut solver =
            GbSolver::serial(config, &atoms, params.clone(), GbTopology::default()).unwrap();
        solver
            .update_pairlist(&ShortRangePairList::from_pairs([(0, 1)]))
            .unwrap();
        let output = solver.step(&atoms).unwrap();

        assert_eq!(solver.born_radii(), &[rho, rho]);
        assert!(solver.state().clamped.iter().all(|&c| c));

        let f_gb = (r * r + rho * rho * (-r * r / (4.0 * rho * rho)).exp()).sqrt();
        let pair = -epsfac * q * q / f_gb;
        let self_term = -2.0 * 0.5 * epsfac * q * q / rho;
        let nonpolar = 2.0
            * params.surface_tension.hct_obc_factor()
            * NONPOLAR_TERM
            * (rho + params.probe_radius).powi(2);

        assert!((output.terms.polar_pairs - pair).abs() < 1e-6);
        assert!((output.terms.self_correction - self_term).abs() < 1e-6);
        assert!((output.terms.nonpolar - nonpolar).abs() < 1e-6);
        assert_eq!(output.terms.polar_bonded, 0.0);

        // Like charges repel; clamped radii contribute no chain-rule force.
        assert!(output.forces[0].x < 0.0);
        assert_eq!(output.forces[0], -output.forces[1]);
    }

    #[test]
    fn bonded_pairs_contribute_to_polar_bonded_energy() {
        let atoms = cluster();
        let bonds = [
            Bond::new(0, 1, 0.152),
            Bond::new(1, 2, 0.143),
            Bond::new(0, 3, 0.143),
        ];
        let angles = [Angle::new(0, 1, 2, 109.5), Angle::new(3, 0, 1, 109.5)];
        let pairs14 = [Pair14::new(3, 2)];
        let topology = GbTopology::generate(&atoms, &bonds, &angles, &pairs14).unwrap();

        let mut nonbonded = ShortRangePairList::new();
        nonbonded.push_row(4, &[0, 3, 5]);
        nonbonded.push_row(5, &[0, 1, 3]);

        for algorithm in [GbAlgorithm::Still, GbAlgorithm::Hct, GbAlgorithm::Obc] {
            let mut solver = GbSolver::serial(
                config(algorithm),
                &atoms,
                cluster_params(atoms.len(), 0.009),
                topology.clone(),
            )
            .unwrap();
            solver.update_pairlist(&nonbonded).unwrap();
            let output = solver.step(&atoms).unwrap();

            assert!(output.terms.polar_bonded != 0.0);
            assert!(output.terms.polar_pairs != 0.0);
            let total: Vector3<f64> = output.forces.iter().sum();
            assert!(total.norm() < 1e-9);
        }
    }

    #[test]
    fn disabling_nonbonded_pairs_drops_their_energy() {
        let atoms = cluster();
        let config = GbConfigBuilder::new()
            .algorithm(GbAlgorithm::Obc)
            .include_nonbonded_pairs(false)
            .build()
            .unwrap();
        let mut solver = GbSolver::serial(
            config,
            &atoms,
            cluster_params(atoms.len(), 0.009),
            GbTopology::default(),
        )
        .unwrap();
        solver.update_pairlist(&all_pairs(atoms.len())).unwrap();
        let output = solver.step(&atoms).unwrap();
        assert_eq!(output.terms.polar_pairs, 0.0);
        assert!(output.terms.self_correction < 0.0);
    }

    #[test]
    fn new_rejects_radius_not_exceeding_offset() {
        let atoms = cluster();
        let mut params = cluster_params(atoms.len(), 0.009);
        params.radius[2] = 0.009;
        let result = GbSolver::serial(config(GbAlgorithm::Hct), &atoms, params, GbTopology::default());
        assert!(matches!(
            result,
            Err(EngineError::InvalidRadius { atom: 2, .. })
        ));
    }

    #[test]
    fn new_rejects_parameters_resolved_with_another_offset() {
        let atoms = cluster();
        let result = GbSolver::serial(
            config(GbAlgorithm::Obc),
            &atoms,
            cluster_params(atoms.len(), 0.0),
            GbTopology::default(),
        );
        assert!(matches!(
            result,
            Err(EngineError::Config {
                source: ConfigError::InvalidValue {
                    name: "dielectric_offset",
                    ..
                }
            })
        ));
    }

    #[test]
    fn repeated_pairs_are_evaluated_once() {
        let atoms = cluster();
        let mut repeated = ShortRangePairList::new();
        repeated.push_row(4, &[5, 0]);
        repeated.push_row(5, &[4]);
        repeated.push_row(4, &[5, 4]);

        for algorithm in [GbAlgorithm::Still, GbAlgorithm::Hct, GbAlgorithm::Obc] {
            let mut reference = solver_with(algorithm, SerialCommunicator);
            reference
                .update_pairlist(&ShortRangePairList::from_pairs([(4, 5), (4, 0)]))
                .unwrap();
            let expected = reference.step(&atoms).unwrap();

            let mut solver = solver_with(algorithm, SerialCommunicator);
            solver.update_pairlist(&repeated).unwrap();
            let output = solver.step(&atoms).unwrap();

            assert!(close(output.terms.total(), expected.terms.total(), 1e-12));
            for (a, b) in output.forces.iter().zip(&expected.forces) {
                assert!((a - b).norm() < 1e-9);
            }
        }
    }

    #[test]
    fn failing_rank_fails_the_whole_group() {
        let mut atoms = cluster();
        atoms[3].position = Point3::new(50.0, 0.0, 0.0);
        // Two rows, one per rank; only the second reaches past the kernel table.
        let mut pairs = ShortRangePairList::new();
        pairs.push_row(0, &[1]);
        pairs.push_row(2, &[3]);

        let results = LocalGroup::run(2, |comm| -> Result<StepOutput, EngineError> {
            let mut solver = GbSolver::new(
                config(GbAlgorithm::Obc),
                &atoms,
                cluster_params(atoms.len(), 0.009),
                GbTopology::default(),
                comm,
            )?;
            solver.update_pairlist(&pairs)?;
            solver.step(&atoms)
        })
        .unwrap();

        assert!(matches!(
            results[0],
            Err(EngineError::Comm {
                source: CommError::Aborted { rank: 1 }
            })
        ));
        assert!(matches!(results[1], Err(EngineError::TableRange { .. })));
    }

    #[test]
    fn step_rejects_wrong_atom_count() {
        let atoms = cluster();
        let mut solver = solver_with(GbAlgorithm::Obc, SerialCommunicator);
        let result = solver.step(&atoms[..4]);
        assert!(matches!(
            result,
            Err(EngineError::LengthMismatch { what: "atoms", .. })
        ));
    }

    #[test]
    fn step_before_pairlist_update_sees_no_neighbors() {
        let atoms = cluster();
        let mut solver = GbSolver::serial(
            config(GbAlgorithm::Hct),
            &atoms,
            cluster_params(atoms.len(), 0.009),
            GbTopology::default(),
        )
        .unwrap();
        let output = solver.step(&atoms).unwrap();
        assert_eq!(output.terms.polar_pairs, 0.0);
        assert!(solver.neighbor_list().is_empty());
    }
}
