use crate::cli::ComputeArgs;
use crate::config::{PartialRunConfig, RunConfig};
use crate::error::{CliError, Result};
use crate::system::{MolecularSystem, SystemFile};
use genborn::core::forcefield::params::{GbGlobals, GbParameters, ModelParameters};
use genborn::core::forcefield::term::SolvationTerms;
use genborn::core::models::pairlist::ShortRangePairList;
use genborn::core::models::topology::GbTopology;
use genborn::engine::comm::{CommError, Communicator, LocalGroup, SerialCommunicator};
use genborn::engine::error::EngineError;
use genborn::workflows::solvate::GbSolver;
use itertools::Itertools;
use nalgebra::Vector3;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Per-atom results of one evaluation, with forces summed over all ranks.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputeReport {
    pub terms: SolvationTerms,
    pub radii: Vec<f64>,
    pub forces: Vec<Vector3<f64>>,
}

#[derive(Serialize)]
struct AtomRow {
    atom: usize,
    born_radius: f64,
    fx: f64,
    fy: f64,
    fz: f64,
}

pub fn run(args: ComputeArgs) -> Result<()> {
    let partial_config = match &args.config {
        Some(path) => PartialRunConfig::from_file(path)?,
        None => PartialRunConfig::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_with_cli(&args)?;

    let globals = match &args.params {
        Some(path) => GbParameters::load_globals(path)?,
        None => GbGlobals::default(),
    };
    let types = GbParameters::load_types_csv(&args.types)?;
    let parameters = GbParameters::from_parts(globals, types)?;

    let system = SystemFile::load(&args.system)?.resolve(&parameters)?;
    let report = evaluate(&system, &parameters, &config)?;

    print_report(&config, &report);

    if let Some(path) = &args.output {
        write_atoms_csv(path, &report)?;
        println!("Per-atom radii and forces written to: {}", path.display());
    }
    Ok(())
}

/// Sets up the solver for `system` and runs one step on `config.ranks` ranks.
pub fn evaluate(
    system: &MolecularSystem,
    parameters: &GbParameters,
    config: &RunConfig,
) -> Result<ComputeReport> {
    let topology = GbTopology::generate(
        &system.atoms,
        &system.bonds,
        &system.angles,
        &system.pairs14,
    )?;
    let model_params = parameters.resolve(&system.atoms, config.gb.dielectric_offset)?;
    let pairlist = system.find_pairs(config.cutoff);

    info!(
        "Evaluating {} model on {} atoms with {} rank(s)",
        config.gb.algorithm,
        system.atoms.len(),
        config.ranks
    );

    if config.ranks == 1 {
        return Ok(step_on_rank(
            system,
            &model_params,
            &topology,
            &pairlist,
            config,
            SerialCommunicator,
        )?);
    }

    let (reports, failures): (Vec<_>, Vec<_>) = LocalGroup::run(config.ranks, |comm| {
        step_on_rank(system, &model_params, &topology, &pairlist, config, comm)
    })?
    .into_iter()
    .partition_result();

    if let Some(error) = root_cause(failures) {
        return Err(error.into());
    }

    let mut reports = reports.into_iter();
    let mut combined = reports
        .next()
        .ok_or_else(|| CliError::Argument("No rank produced a result".to_string()))?;
    for report in reports {
        for (total, partial) in combined.forces.iter_mut().zip(&report.forces) {
            *total += partial;
        }
    }
    Ok(combined)
}

/// The first rank failure that did not merely observe another rank leaving the group.
fn root_cause(failures: Vec<EngineError>) -> Option<EngineError> {
    failures.into_iter().min_by_key(|error| {
        matches!(
            error,
            EngineError::Comm {
                source: CommError::Aborted { .. }
            }
        )
    })
}

fn step_on_rank<C: Communicator>(
    system: &MolecularSystem,
    params: &ModelParameters,
    topology: &GbTopology,
    pairlist: &ShortRangePairList,
    config: &RunConfig,
    comm: C,
) -> std::result::Result<ComputeReport, EngineError> {
    let mut solver = GbSolver::new(
        config.gb.clone(),
        &system.atoms,
        params.clone(),
        topology.clone(),
        comm,
    )?;
    solver.update_pairlist(pairlist)?;
    let output = solver.step(&system.atoms)?;
    Ok(ComputeReport {
        terms: output.terms,
        radii: solver.born_radii().to_vec(),
        forces: output.forces,
    })
}

fn print_report(config: &RunConfig, report: &ComputeReport) {
    let terms = &report.terms;
    println!("GB solvation energy ({} model), kJ/mol:", config.gb.algorithm);
    println!("  polar (bonded pairs)    {:>16.6}", terms.polar_bonded);
    println!("  polar (short-range)     {:>16.6}", terms.polar_pairs);
    println!("  self correction         {:>16.6}", terms.self_correction);
    println!("  nonpolar                {:>16.6}", terms.nonpolar);
    println!("  total                   {:>16.6}", terms.total());
}

fn write_atoms_csv(path: &Path, report: &ComputeReport) -> Result<()> {
    let to_error = |e: csv::Error| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    };
    let mut writer = csv::Writer::from_path(path).map_err(to_error)?;
    for (atom, (radius, force)) in report.radii.iter().zip(&report.forces).enumerate() {
        writer
            .serialize(AtomRow {
                atom,
                born_radius: *radius,
                fx: force.x,
                fy: force.y,
                fz: force.z,
            })
            .map_err(to_error)?;
    }
    writer.flush()?;
    Ok(())
}
