/// Per-atom outputs of the radius pass and the model-specific intermediates the later phases
/// read back.
///
/// Owned by the solver and reused across steps. `gpol` and `vsolv` are the Still seeds and
/// are filled once at setup; every other vector is overwritten each step before it is read.
#[derive(Debug, Clone, PartialEq)]
pub struct BornState {
    /// Effective Born radius in nm.
    pub radius: Vec<f64>,
    /// `1/sqrt(radius)`.
    pub inv_sqrt_radius: Vec<f64>,
    /// Still polarization seed (self, 1-2 and 1-3 terms).
    pub gpol: Vec<f64>,
    /// Still solvation volume.
    pub vsolv: Vec<f64>,
    /// The model accumulator: the Still polarization sum or the HCT/OBC descreening sum.
    pub accumulator: Vec<f64>,
    /// Derivative of the OBC rescaling, zero for the other models.
    pub drobc: Vec<f64>,
    /// Atoms whose radius is held at the intrinsic radius and does not depend on positions:
    /// HCT radii hitting the floor, and non-participating atoms in the Still model.
    pub clamped: Vec<bool>,
}

impl BornState {
    pub fn new(natoms: usize) -> Self {
        Self {
            radius: vec![0.0; natoms],
            inv_sqrt_radius: vec![0.0; natoms],
            gpol: vec![0.0; natoms],
            vsolv: vec![0.0; natoms],
            accumulator: vec![0.0; natoms],
            drobc: vec![0.0; natoms],
            clamped: vec![false; natoms],
        }
    }

    pub fn natoms(&self) -> usize {
        self.radius.len()
    }

    /// Stores a finalized radius and its inverse square root.
    #[inline]
    pub fn set_radius(&mut self, atom: usize, radius: f64) {
        self.radius[atom] = radius;
        self.inv_sqrt_radius[atom] = 1.0 / radius.sqrt();
    }
}
