use std::collections::HashSet;

/// The general short-range pair list produced by the host's non-bonded search.
///
/// Stored in compressed row form: row `r` lists the partners of `i_atoms[r]` in
/// `j_atoms[j_start[r]..j_start[r + 1]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortRangePairList {
    i_atoms: Vec<usize>,
    j_start: Vec<usize>,
    j_atoms: Vec<usize>,
}

impl Default for ShortRangePairList {
    fn default() -> Self {
        Self::new()
    }
}

impl ShortRangePairList {
    pub fn new() -> Self {
        Self {
            i_atoms: Vec::new(),
            j_start: vec![0],
            j_atoms: Vec::new(),
        }
    }

    /// Builds a list from `(i, j)` tuples, grouping consecutive tuples with the same `i`
    /// into one row.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let mut list = Self::new();
        for (i, j) in pairs {
            if list.i_atoms.last() != Some(&i) {
                list.i_atoms.push(i);
                list.j_start.push(list.j_atoms.len());
            }
            list.j_atoms.push(j);
            if let Some(end) = list.j_start.last_mut() {
                *end = list.j_atoms.len();
            }
        }
        list
    }

    /// Appends a row listing the partners of atom `i`.
    pub fn push_row(&mut self, i: usize, partners: &[usize]) {
        self.i_atoms.push(i);
        self.j_atoms.extend_from_slice(partners);
        self.j_start.push(self.j_atoms.len());
    }

    /// Iterates the rows as `(i, partners)`.
    pub fn rows(&self) -> impl Iterator<Item = (usize, &[usize])> {
        self.i_atoms
            .iter()
            .enumerate()
            .map(move |(r, &i)| (i, &self.j_atoms[self.j_start[r]..self.j_start[r + 1]]))
    }

    /// Iterates every listed pair as `(i, j)`.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.rows()
            .flat_map(|(i, partners)| partners.iter().map(move |&j| (i, j)))
    }

    /// A copy that keeps the first occurrence of every unordered pair and drops self pairs.
    /// Rows keep their order, so a row split over ranks stays the same.
    pub fn deduplicated(&self) -> Self {
        let mut seen = HashSet::with_capacity(self.j_atoms.len());
        let mut list = Self::new();
        let mut partners = Vec::new();
        for (i, row) in self.rows() {
            partners.clear();
            partners.extend(
                row.iter()
                    .copied()
                    .filter(|&j| i != j && seen.insert((i.min(j), i.max(j)))),
            );
            list.push_row(i, &partners);
        }
        list
    }

    pub fn row_count(&self) -> usize {
        self.i_atoms.len()
    }

    pub fn pair_count(&self) -> usize {
        self.j_atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.j_atoms.is_empty()
    }
}
