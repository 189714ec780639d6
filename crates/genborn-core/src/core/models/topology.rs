use super::atom::AtomRecord;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq)]
pub enum TopologyError {
    #[error("Atom index {index} is out of range for a system of {natoms} atoms")]
    AtomIndexOutOfRange { index: usize, natoms: usize },
    #[error("No bond length is known between atoms {0} and {1}, required by an angle")]
    MissingBondLength(usize, usize),
    #[error("Bonded GB pair ({0}, {1}) has no reference distance")]
    MissingPairDistance(usize, usize),
}

/// A chemical bond with its reference length in nm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bond {
    pub atoms: [usize; 2],
    pub length: f64,
}

impl Bond {
    pub fn new(i: usize, j: usize, length: f64) -> Self {
        Self {
            atoms: [i, j],
            length,
        }
    }
}

/// A bond angle `i-j-k` with its reference value in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Angle {
    pub atoms: [usize; 3],
    pub theta_degrees: f64,
}

impl Angle {
    pub fn new(i: usize, j: usize, k: usize, theta_degrees: f64) -> Self {
        Self {
            atoms: [i, j, k],
            theta_degrees,
        }
    }
}

/// A 1-4 pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pair14 {
    pub atoms: [usize; 2],
}

impl Pair14 {
    pub fn new(i: usize, j: usize) -> Self {
        Self { atoms: [i, j] }
    }
}

/// The separation class of a bonded GB pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BondedKind {
    OneTwo,
    OneThree,
    OneFour,
}

/// One bonded GB interaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BondedGbPair {
    pub i: usize,
    pub j: usize,
    /// Reference separation in nm: the bond length for 1-2 pairs, the law-of-cosines distance
    /// for 1-3 pairs, and `None` for 1-4 pairs.
    pub distance: Option<f64>,
}

impl BondedGbPair {
    pub fn reference_distance(&self) -> Result<f64, TopologyError> {
        self.distance
            .ok_or(TopologyError::MissingPairDistance(self.i, self.j))
    }
}

/// The bonded GB pair lists consumed by the neighbor list builder, the Still initialisation
/// and the bonded GB energy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GbTopology {
    pub gb12: Vec<BondedGbPair>,
    pub gb13: Vec<BondedGbPair>,
    pub gb14: Vec<BondedGbPair>,
}

impl GbTopology {
    /// Derives the bonded GB pairs from the molecule's bonds, angles and 1-4 pairs.
    ///
    /// 1-2 pairs are kept only when both atoms carry charge. The 1-3 distance is obtained from
    /// the two bond lengths around the central atom and the reference angle; a missing bond is
    /// a topology defect and aborts the generation.
    pub fn generate(
        atoms: &[AtomRecord],
        bonds: &[Bond],
        angles: &[Angle],
        pairs14: &[Pair14],
    ) -> Result<Self, TopologyError> {
        let natoms = atoms.len();
        let check = |index: usize| {
            if index < natoms {
                Ok(index)
            } else {
                Err(TopologyError::AtomIndexOutOfRange { index, natoms })
            }
        };

        let mut lengths: HashMap<(usize, usize), f64> = HashMap::with_capacity(bonds.len());
        let mut gb12 = Vec::with_capacity(bonds.len());
        for bond in bonds {
            let i = check(bond.atoms[0])?;
            let j = check(bond.atoms[1])?;
            lengths.insert(canonical(i, j), bond.length);

            if atoms[i].charge != 0.0 && atoms[j].charge != 0.0 {
                gb12.push(BondedGbPair {
                    i,
                    j,
                    distance: Some(bond.length),
                });
            }
        }

        let mut gb13 = Vec::with_capacity(angles.len());
        for angle in angles {
            let [a, b, c] = angle.atoms;
            let (a, b, c) = (check(a)?, check(b)?, check(c)?);
            let rab = *lengths
                .get(&canonical(a, b))
                .ok_or(TopologyError::MissingBondLength(a, b))?;
            let rbc = *lengths
                .get(&canonical(b, c))
                .ok_or(TopologyError::MissingBondLength(b, c))?;
            let cosine = angle.theta_degrees.to_radians().cos();
            let r2 = rab * rab + rbc * rbc - 2.0 * rab * rbc * cosine;
            gb13.push(BondedGbPair {
                i: a,
                j: c,
                distance: Some(r2.sqrt()),
            });
        }

        let gb14 = pairs14
            .iter()
            .map(|pair| {
                Ok(BondedGbPair {
                    i: check(pair.atoms[0])?,
                    j: check(pair.atoms[1])?,
                    distance: None,
                })
            })
            .collect::<Result<Vec<_>, TopologyError>>()?;

        debug!(
            "Generated bonded GB topology: {} 1-2, {} 1-3, {} 1-4 pairs",
            gb12.len(),
            gb13.len(),
            gb14.len()
        );

        Ok(Self { gb12, gb13, gb14 })
    }

    pub fn pairs(&self, kind: BondedKind) -> &[BondedGbPair] {
        match kind {
            BondedKind::OneTwo => &self.gb12,
            BondedKind::OneThree => &self.gb13,
            BondedKind::OneFour => &self.gb14,
        }
    }

    /// Iterates all bonded pairs in 1-2, 1-3, 1-4 order.
    pub fn iter(&self) -> impl Iterator<Item = (BondedKind, &BondedGbPair)> {
        self.gb12
            .iter()
            .map(|p| (BondedKind::OneTwo, p))
            .chain(self.gb13.iter().map(|p| (BondedKind::OneThree, p)))
            .chain(self.gb14.iter().map(|p| (BondedKind::OneFour, p)))
    }

    pub fn len(&self) -> usize {
        self.gb12.len() + self.gb13.len() + self.gb14.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn canonical(i: usize, j: usize) -> (usize, usize) {
    if i < j { (i, j) } else { (j, i) }
}
