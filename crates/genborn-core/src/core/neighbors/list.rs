use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Returns a process-wide unique identifier for a freshly built list.
pub(crate) fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// The position of one directed pair `(i, j)` in the flat partner array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairSlot(usize);

impl PairSlot {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// One directed entry of the neighbor list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairEntry {
    pub slot: PairSlot,
    pub i: usize,
    pub j: usize,
}

/// The GB neighbor list: a symmetric, atom-indexed adjacency in compressed row form.
///
/// `partners[offsets[i]..offsets[i + 1]]` are the partners of atom `i`; every unordered pair
/// is stored once in each endpoint's row. Each rebuild is stamped with a new generation so
/// buffers produced against an older list can be recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborList {
    pub(crate) offsets: Vec<usize>,
    pub(crate) partners: Vec<usize>,
    pub(crate) generation: u64,
}

impl NeighborList {
    /// An empty list over `natoms` atoms.
    pub fn empty(natoms: usize) -> Self {
        Self {
            offsets: vec![0; natoms + 1],
            partners: Vec::new(),
            generation: next_generation(),
        }
    }

    pub fn natoms(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Total number of directed entries (twice the number of unordered pairs).
    pub fn len(&self) -> usize {
        self.partners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn partners(&self, atom: usize) -> &[usize] {
        &self.partners[self.offsets[atom]..self.offsets[atom + 1]]
    }

    /// The slot range covered by the rows `atoms`.
    #[inline]
    pub fn slot_range(&self, atoms: Range<usize>) -> Range<usize> {
        self.offsets[atoms.start]..self.offsets[atoms.end]
    }

    #[cfg(test)]
    pub(crate) fn pair(&self, slot: PairSlot) -> Option<PairEntry> {
        let j = *self.partners.get(slot.index())?;
        let i = self.offsets.partition_point(|&o| o <= slot.index()) - 1;
        Some(PairEntry { slot, i, j })
    }

    /// Iterates the entries of the rows `atoms` in traversal order (atom-major, partner-minor).
    pub fn entries(&self, atoms: Range<usize>) -> impl Iterator<Item = PairEntry> + '_ {
        atoms.flat_map(move |i| {
            let start = self.offsets[i];
            self.partners(i)
                .iter()
                .enumerate()
                .map(move |(k, &j)| PairEntry {
                    slot: PairSlot(start + k),
                    i,
                    j,
                })
        })
    }

    /// Checks that every unordered pair appears exactly once in each endpoint's row.
    pub fn is_symmetric(&self) -> bool {
        let mut forward: Vec<(usize, usize)> = self
            .entries(0..self.natoms())
            .map(|e| (e.i, e.j))
            .collect();
        let mut backward: Vec<(usize, usize)> = forward.iter().map(|&(i, j)| (j, i)).collect();
        forward.sort_unstable();
        backward.sort_unstable();
        forward == backward && forward.windows(2).all(|w| w[0] != w[1])
    }
}
