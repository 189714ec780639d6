use super::list::{NeighborList, next_generation};
use crate::core::models::pairlist::ShortRangePairList;
use crate::core::models::topology::{BondedKind, GbTopology};
use std::collections::HashSet;
use std::collections::TryReserveError;
use thiserror::Error;
use tracing::{debug, instrument};

/// Storage grows to this multiple of the required size so small list changes between steps
/// do not reallocate.
const CAPACITY_HEADROOM: f64 = 1.1;

#[derive(Debug, Error)]
pub enum NeighborListError {
    #[error("Failed to grow GB neighbor list storage to {requested} entries: {source}")]
    Allocation {
        requested: usize,
        source: TryReserveError,
    },
    #[error("Atom index {index} is out of range for a system of {natoms} atoms")]
    AtomIndexOutOfRange { index: usize, natoms: usize },
}

/// Which bonded GB pairs enter the neighbor list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondedInclusion {
    /// 1-2, 1-3 and 1-4 pairs (HCT, OBC).
    All,
    /// 1-4 pairs only; Still folds 1-2 and 1-3 into its polarization seed.
    OneFourOnly,
}

impl BondedInclusion {
    fn includes(self, kind: BondedKind) -> bool {
        match self {
            Self::All => true,
            Self::OneFourOnly => kind == BondedKind::OneFour,
        }
    }
}

/// Derives the GB neighbor list from the bonded GB pairs and the general short-range list.
///
/// The builder owns the list and its scratch space so that rebuilding every time the
/// general pair list changes reuses the previous allocations.
#[derive(Debug)]
pub struct NeighborListBuilder {
    list: NeighborList,
    accepted: Vec<(usize, usize)>,
    seen: HashSet<(usize, usize)>,
    cursor: Vec<usize>,
}

impl NeighborListBuilder {
    pub fn new(natoms: usize) -> Self {
        Self {
            list: NeighborList::empty(natoms),
            accepted: Vec::new(),
            seen: HashSet::new(),
            cursor: vec![0; natoms],
        }
    }

    pub fn list(&self) -> &NeighborList {
        &self.list
    }

    /// Rebuilds the list in place and returns it.
    ///
    /// Each unordered pair is accepted at most once per source (bonded, general) and written
    /// into both endpoints' rows. Self pairs are ignored.
    #[instrument(skip_all, name = "gb_neighbor_list")]
    pub fn rebuild(
        &mut self,
        inclusion: BondedInclusion,
        topology: &GbTopology,
        pairlist: &ShortRangePairList,
    ) -> Result<&NeighborList, NeighborListError> {
        let natoms = self.list.natoms();
        self.accepted.clear();

        self.seen.clear();
        for (kind, pair) in topology.iter() {
            if inclusion.includes(kind) {
                self.accept(pair.i, pair.j, natoms)?;
            }
        }
        let bonded = self.accepted.len();

        self.seen.clear();
        for (i, j) in pairlist.pairs() {
            self.accept(i, j, natoms)?;
        }

        self.fill(natoms)?;
        self.list.generation = next_generation();

        debug!(
            "Built GB neighbor list: {} bonded and {} short-range pairs, {} entries",
            bonded,
            self.accepted.len() - bonded,
            self.list.len()
        );
        Ok(&self.list)
    }

    fn accept(&mut self, i: usize, j: usize, natoms: usize) -> Result<(), NeighborListError> {
        for index in [i, j] {
            if index >= natoms {
                return Err(NeighborListError::AtomIndexOutOfRange { index, natoms });
            }
        }
        if i == j {
            return Ok(());
        }
        let key = if i < j { (i, j) } else { (j, i) };
        if self.seen.insert(key) {
            reserve(&mut self.accepted, 1)?;
            self.accepted.push((i, j));
        }
        Ok(())
    }

    fn fill(&mut self, natoms: usize) -> Result<(), NeighborListError> {
        let offsets = &mut self.list.offsets;
        offsets.iter_mut().for_each(|o| *o = 0);
        for &(i, j) in &self.accepted {
            offsets[i + 1] += 1;
            offsets[j + 1] += 1;
        }
        for a in 0..natoms {
            offsets[a + 1] += offsets[a];
        }

        let total = offsets[natoms];
        let partners = &mut self.list.partners;
        partners.clear();
        reserve(partners, total)?;
        partners.resize(total, 0);

        self.cursor.copy_from_slice(&offsets[..natoms]);
        for &(i, j) in &self.accepted {
            partners[self.cursor[i]] = j;
            self.cursor[i] += 1;
            partners[self.cursor[j]] = i;
            self.cursor[j] += 1;
        }
        Ok(())
    }
}

/// Ensures room for `additional` more elements, growing with headroom.
fn reserve<T>(storage: &mut Vec<T>, additional: usize) -> Result<(), NeighborListError> {
    let required = storage.len() + additional;
    if required <= storage.capacity() {
        return Ok(());
    }
    let requested = ((required as f64) * CAPACITY_HEADROOM).ceil() as usize;
    storage
        .try_reserve_exact(requested - storage.len())
        .map_err(|source| NeighborListError::Allocation { requested, source })
}
