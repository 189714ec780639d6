use nalgebra::Point3;

/// Represents one atom as seen by the Generalized Born solver.
///
/// Records are owned by the surrounding simulation engine and are treated as immutable for
/// the duration of a step. Positions are in nanometres and charges in elementary charge units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtomRecord {
    /// The Cartesian position of the atom in nm.
    pub position: Point3<f64>,
    /// The partial charge in e.
    pub charge: f64,
    /// Index into the per-type GB parameter table.
    pub type_index: usize,
    /// Whether the atom takes part in solvation.
    ///
    /// Virtual sites without charge and without dispersion are excluded: they neither
    /// descreen their neighbours nor receive self or nonpolar corrections.
    pub participates: bool,
}

impl AtomRecord {
    /// Creates a participating atom record.
    pub fn new(position: Point3<f64>, charge: f64, type_index: usize) -> Self {
        Self {
            position,
            charge,
            type_index,
            participates: true,
        }
    }

    /// Returns a copy of this record with the participation flag overridden.
    pub fn with_participation(mut self, participates: bool) -> Self {
        self.participates = participates;
        self
    }

    /// Decides participation from the atom's charge and its self-interaction dispersion
    /// coefficients. Only an atom with zero charge, zero C6 and zero C12 (a pure virtual
    /// site) is excluded.
    pub fn solvation_flag(charge: f64, c6: f64, c12: f64) -> bool {
        !(charge == 0.0 && c6 == 0.0 && c12 == 0.0)
    }
}
