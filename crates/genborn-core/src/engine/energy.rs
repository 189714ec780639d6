use super::error::EngineError;
use super::state::BornState;
use crate::core::forcefield::params::ModelParameters;
use crate::core::forcefield::potentials::NONPOLAR_TERM;
use crate::core::forcefield::table::GbTable;
use crate::core::models::atom::AtomRecord;
use crate::core::models::pairlist::ShortRangePairList;
use crate::core::models::topology::BondedGbPair;
use nalgebra::Vector3;
use std::ops::Range;

/// Read-only inputs shared by the tabulated pair terms.
#[derive(Debug, Clone, Copy)]
pub struct EnergyInput<'a> {
    pub atoms: &'a [AtomRecord],
    pub state: &'a BornState,
    pub table: &'a GbTable,
    /// `k·(1/ε_solute − 1/ε_solvent)`.
    pub epsfac: f64,
}

/// Tabulated GB interaction of one pair.
///
/// Adds the Cartesian forces at fixed radii and the `dE/dR` of both atoms, and returns the
/// pair energy.
#[inline]
fn gb_pair(
    input: &EnergyInput<'_>,
    i: usize,
    j: usize,
    dvda: &mut [f64],
    forces: &mut [Vector3<f64>],
) -> Result<f64, EngineError> {
    let qiqj = input.atoms[i].charge * input.atoms[j].charge;
    if qiqj == 0.0 {
        return Ok(0.0);
    }

    let dx = input.atoms[i].position - input.atoms[j].position;
    let r = dx.norm();
    let isai = input.state.inv_sqrt_radius[i];
    let isaj = input.state.inv_sqrt_radius[j];
    let isaprod = isai * isaj;

    let qq = -input.epsfac * qiqj * isaprod;
    let gbscale = isaprod * input.table.scale();
    let lookup = input.table.evaluate(r * gbscale)?;

    let vgb = qq * lookup.value;
    let fij_c = qq * lookup.derivative * gbscale;
    let dvdatmp = -0.5 * (vgb + fij_c * r);
    dvda[i] += dvdatmp * isai * isai;
    dvda[j] += dvdatmp * isaj * isaj;

    let t = dx * (-fij_c / r);
    forces[i] += t;
    forces[j] -= t;

    Ok(vgb)
}

/// Tabulated GB energy of the bonded pairs `pairs`.
pub fn bonded_gb_energy(
    input: &EnergyInput<'_>,
    pairs: &[BondedGbPair],
    dvda: &mut [f64],
    forces: &mut [Vector3<f64>],
) -> Result<f64, EngineError> {
    pairs
        .iter()
        .try_fold(0.0, |acc, pair| Ok(acc + gb_pair(input, pair.i, pair.j, dvda, forces)?))
}

/// Tabulated GB energy of the short-range pairs listed in rows `rows` of `pairlist`.
///
/// Every listed pair is evaluated; pass a [`ShortRangePairList::deduplicated`] list when the
/// host may repeat pairs.
pub fn pair_gb_energy(
    input: &EnergyInput<'_>,
    pairlist: &ShortRangePairList,
    rows: Range<usize>,
    dvda: &mut [f64],
    forces: &mut [Vector3<f64>],
) -> Result<f64, EngineError> {
    let mut energy = 0.0;
    for (i, partners) in pairlist.rows().skip(rows.start).take(rows.len()) {
        for &j in partners {
            if i != j {
                energy += gb_pair(input, i, j, dvda, forces)?;
            }
        }
    }
    Ok(energy)
}

/// The self-energy `−½·epsfac·q²/R` of the participating atoms in `atoms_range`.
pub fn self_energy(
    atoms: &[AtomRecord],
    state: &BornState,
    epsfac: f64,
    atoms_range: Range<usize>,
    dvda: &mut [f64],
) -> f64 {
    let mut energy = 0.0;
    for i in atoms_range {
        let atom = &atoms[i];
        if !atom.participates {
            continue;
        }
        let rai_inv = 1.0 / state.radius[i];
        let e = epsfac * atom.charge * atom.charge * rai_inv;
        dvda[i] += 0.5 * e * rai_inv;
        energy -= 0.5 * e;
    }
    energy
}

/// The ACE-type nonpolar correction `factor·4π·(ρ + probe)²·(ρ/R)⁶` of the participating
/// atoms in `atoms_range`. `factor` is the surface tension in kJ/(mol·nm²).
pub fn nonpolar_energy(
    atoms: &[AtomRecord],
    params: &ModelParameters,
    state: &BornState,
    factor: f64,
    atoms_range: Range<usize>,
    dvda: &mut [f64],
) -> f64 {
    let probe = params.probe_radius;
    let mut energy = 0.0;
    for i in atoms_range {
        if !atoms[i].participates {
            continue;
        }
        let rai = params.radius[i];
        let ratio = rai / state.radius[i];
        let ratio6 = ratio.powi(6);
        let e = factor * NONPOLAR_TERM * (rai + probe) * (rai + probe) * ratio6;
        dvda[i] -= 6.0 * e / state.radius[i];
        energy += e;
    }
    energy
}
