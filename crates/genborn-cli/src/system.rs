use crate::error::{CliError, Result};
use genborn::core::forcefield::params::GbParameters;
use genborn::core::models::atom::AtomRecord;
use genborn::core::models::pairlist::ShortRangePairList;
use genborn::core::models::topology::{Angle, Bond, Pair14};
use itertools::Itertools;
use nalgebra::Point3;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct AtomEntry {
    #[serde(rename = "type")]
    type_name: String,
    charge: f64,
    /// Position in nm.
    position: [f64; 3],
    participates: Option<bool>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct BondEntry {
    atoms: [usize; 2],
    length: f64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct AngleEntry {
    atoms: [usize; 3],
    /// Reference angle in degrees.
    theta: f64,
}

/// The on-disk system description.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct SystemFile {
    #[serde(default)]
    atoms: Vec<AtomEntry>,
    #[serde(default)]
    bonds: Vec<BondEntry>,
    #[serde(default)]
    angles: Vec<AngleEntry>,
    #[serde(default)]
    pairs14: Vec<[usize; 2]>,
}

/// A system with atom types resolved against a parameter set.
#[derive(Debug, Clone)]
pub struct MolecularSystem {
    pub atoms: Vec<AtomRecord>,
    pub bonds: Vec<Bond>,
    pub angles: Vec<Angle>,
    pub pairs14: Vec<Pair14>,
}

impl SystemFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let system: Self = toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        info!(
            "Loaded system with {} atoms and {} bonds from {:?}",
            system.atoms.len(),
            system.bonds.len(),
            path
        );
        Ok(system)
    }

    pub fn resolve(self, params: &GbParameters) -> Result<MolecularSystem> {
        if self.atoms.is_empty() {
            return Err(CliError::Argument(
                "The system does not contain any atoms".to_string(),
            ));
        }

        let atoms = self
            .atoms
            .into_iter()
            .map(|entry| -> Result<AtomRecord> {
                let type_index = params.type_index(&entry.type_name)?;
                let [x, y, z] = entry.position;
                let atom = AtomRecord::new(Point3::new(x, y, z), entry.charge, type_index);
                Ok(match entry.participates {
                    Some(flag) => atom.with_participation(flag),
                    None => atom,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(MolecularSystem {
            atoms,
            bonds: self
                .bonds
                .iter()
                .map(|b| Bond::new(b.atoms[0], b.atoms[1], b.length))
                .collect(),
            angles: self
                .angles
                .iter()
                .map(|a| Angle::new(a.atoms[0], a.atoms[1], a.atoms[2], a.theta))
                .collect(),
            pairs14: self
                .pairs14
                .iter()
                .map(|&[i, j]| Pair14::new(i, j))
                .collect(),
        })
    }
}

impl MolecularSystem {
    /// Pairs that the bonded terms already cover and the short-range list must leave out.
    fn exclusions(&self) -> HashSet<(usize, usize)> {
        let ordered = |i: usize, j: usize| (i.min(j), i.max(j));
        self.bonds
            .iter()
            .map(|b| ordered(b.atoms[0], b.atoms[1]))
            .chain(self.angles.iter().map(|a| ordered(a.atoms[0], a.atoms[2])))
            .chain(self.pairs14.iter().map(|p| ordered(p.atoms[0], p.atoms[1])))
            .collect()
    }

    /// Brute-force short-range pair search: every non-excluded pair closer than `cutoff`.
    pub fn find_pairs(&self, cutoff: f64) -> ShortRangePairList {
        let exclusions = self.exclusions();
        let cutoff2 = cutoff * cutoff;

        let list = ShortRangePairList::from_pairs(
            (0..self.atoms.len())
                .tuple_combinations::<(usize, usize)>()
                .filter(|pair| !exclusions.contains(pair))
                .filter(|&(i, j)| {
                    (self.atoms[i].position - self.atoms[j].position).norm_squared() < cutoff2
                }),
        );
        debug!(
            "Pair search within {} nm found {} pairs ({} exclusions)",
            cutoff,
            list.pair_count(),
            exclusions.len()
        );
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genborn::core::forcefield::params::{AtomTypeParams, GbGlobals};
    use std::fs;
    use tempfile::tempdir;

    const SYSTEM: &str = r#"
        [[atoms]]
        type = "C"
        charge = -0.2
        position = [0.0, 0.0, 0.0]

        [[atoms]]
        type = "H"
        charge = 0.1
        position = [0.109, 0.0, 0.0]

        [[atoms]]
        type = "H"
        charge = 0.1
        position = [-0.036, 0.103, 0.0]

        [[atoms]]
        type = "C"
        charge = 0.0
        position = [2.0, 0.0, 0.0]
        participates = false

        [[bonds]]
        atoms = [0, 1]
        length = 0.109

        [[bonds]]
        atoms = [0, 2]
        length = 0.109

        [[angles]]
        atoms = [1, 0, 2]
        theta = 109.5
    "#;

    fn params() -> GbParameters {
        GbParameters::from_parts(
            GbGlobals::default(),
            vec![
                AtomTypeParams {
                    type_name: "C".to_string(),
                    radius: 0.17,
                    scale: 0.72,
                },
                AtomTypeParams {
                    type_name: "H".to_string(),
                    radius: 0.12,
                    scale: 0.85,
                },
            ],
        )
        .unwrap()
    }

    fn load(content: &str) -> Result<SystemFile> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("system.toml");
        fs::write(&path, content).unwrap();
        SystemFile::load(&path)
    }

    #[test]
    fn load_resolves_types_and_participation() {
        let system = load(SYSTEM).unwrap().resolve(&params()).unwrap();
        assert_eq!(system.atoms.len(), 4);
        assert_eq!(system.atoms[0].type_index, 0);
        assert_eq!(system.atoms[1].type_index, 1);
        assert!(system.atoms[0].participates);
        assert!(!system.atoms[3].participates);
        assert_eq!(system.bonds.len(), 2);
        assert_eq!(system.angles[0].atoms, [1, 0, 2]);
    }

    #[test]
    fn unknown_atom_type_is_reported() {
        let content = SYSTEM.replacen("type = \"H\"", "type = \"N\"", 1);
        let result = load(&content).unwrap().resolve(&params());
        assert!(matches!(result, Err(CliError::Parameters(_))));
    }

    #[test]
    fn empty_system_is_rejected() {
        let result = load("").unwrap().resolve(&params());
        assert!(matches!(result, Err(CliError::Argument(_))));
    }

    #[test]
    fn malformed_file_is_reported() {
        let result = load("[[atoms]]\ntype = \"C\"\n");
        assert!(matches!(result, Err(CliError::FileParsing { .. })));
    }

    #[test]
    fn pair_search_skips_bonded_and_distant_pairs() {
        let system = load(SYSTEM).unwrap().resolve(&params()).unwrap();
        // 0-1 and 0-2 are bonds, 1-2 is an angle, atom 3 is 2 nm away.
        assert!(system.find_pairs(1.0).is_empty());

        let far: Vec<_> = system.find_pairs(2.5).pairs().collect();
        assert_eq!(far, vec![(0, 3), (1, 3), (2, 3)]);
    }
}
